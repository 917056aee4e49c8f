//! In-memory transfer history

use crate::error::TransferFailure;
use crate::progress::TransferStage;
use crate::transfer::{TransferRequest, TransferResult};
use crate::tx::SignedIntention;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ethers::types::{Address, H256};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle status of a recorded transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Not yet published to either chain
    Pending,
    /// Batch published, waiting for confirmations
    Broadcast,
    Confirmed,
    /// Batch published but a confirmation wait failed
    ConfirmationFailed,
    Failed,
}

impl TransferStatus {
    /// Check if no further progress is expected for the transfer
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Confirmed | TransferStatus::ConfirmationFailed | TransferStatus::Failed
        )
    }
}

/// Ledger entry for one transfer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: Uuid,
    pub origin_chain: u64,
    pub destination_chain: u64,
    pub asset: String,
    pub amount: String,
    pub sender: Address,
    pub recipient: String,
    pub status: TransferStatus,
    pub stage: TransferStage,
    pub anchor_txid: Option<String>,
    /// Hash of the value-moving execution call
    pub primary_tx_hash: Option<H256>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    fn from_request(request: &TransferRequest) -> Self {
        let now = Utc::now();
        Self {
            id: request.id,
            origin_chain: request.origin_chain,
            destination_chain: request.destination_chain,
            asset: request.asset.symbol.clone(),
            amount: request.amount.clone(),
            sender: request.sender,
            recipient: request.recipient.clone(),
            status: TransferStatus::Pending,
            stage: TransferStage::Idle,
            anchor_txid: None,
            primary_tx_hash: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Transfer counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    pub pending: u64,
    pub broadcast: u64,
    pub confirmed: u64,
    pub confirmation_failed: u64,
    pub failed: u64,
}

/// History of every transfer an orchestrator has run
#[derive(Default)]
pub struct TransferLedger {
    records: DashMap<Uuid, TransferRecord>,
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the record for `request`
    pub fn record_started(&self, request: &TransferRequest) {
        let mut record = TransferRecord::from_request(request);
        if let Some(previous) = self.records.get(&request.id) {
            record.created_at = previous.created_at;
        }
        self.records.insert(request.id, record);
        debug!("Recorded transfer {}", request.id);
    }

    pub fn update_stage(&self, id: &Uuid, stage: TransferStage) {
        self.update(id, |record| record.stage = stage);
    }

    pub fn record_broadcast(&self, id: &Uuid, anchor_txid: &str, signed: &[SignedIntention]) {
        let hashes: Vec<H256> = signed.iter().map(|s| s.tx_hash).collect();
        let primary = crate::coordination::primary_hash(&hashes);
        self.update(id, |record| {
            record.status = TransferStatus::Broadcast;
            record.anchor_txid = Some(anchor_txid.to_string());
            record.primary_tx_hash = primary;
        });
    }

    pub fn record_confirmed(&self, id: &Uuid, result: &TransferResult) {
        self.update(id, |record| {
            record.status = TransferStatus::Confirmed;
            record.anchor_txid = Some(result.anchor_txid.clone());
            record.primary_tx_hash = Some(result.primary_tx_hash);
            record.error = None;
        });
    }

    /// Record a failed attempt. A batch that was already published is never
    /// reported as failed, only as unconfirmed.
    pub fn record_failed(&self, id: &Uuid, failure: &TransferFailure) {
        let status = if failure.error.is_post_broadcast() {
            TransferStatus::ConfirmationFailed
        } else {
            TransferStatus::Failed
        };
        self.update(id, |record| {
            record.status = status;
            record.error = Some(failure.to_string());
        });
    }

    pub fn get(&self, id: &Uuid) -> Option<TransferRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// All records, newest first
    pub fn list(&self) -> Vec<TransferRecord> {
        let mut records: Vec<TransferRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn stats(&self) -> TransferStats {
        let mut stats = TransferStats::default();
        for record in self.records.iter() {
            match record.status {
                TransferStatus::Pending => stats.pending += 1,
                TransferStatus::Broadcast => stats.broadcast += 1,
                TransferStatus::Confirmed => stats.confirmed += 1,
                TransferStatus::ConfirmationFailed => stats.confirmation_failed += 1,
                TransferStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop terminal records last updated before `cutoff`, returning their ids
    pub fn prune_finished(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        let expired: Vec<Uuid> = self
            .records
            .iter()
            .filter(|r| r.status.is_terminal() && r.updated_at < cutoff)
            .map(|r| r.id)
            .collect();
        for id in &expired {
            self.records.remove(id);
        }
        if !expired.is_empty() {
            debug!("Pruned {} finished transfers", expired.len());
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn update(&self, id: &Uuid, apply: impl FnOnce(&mut TransferRecord)) {
        if let Some(mut record) = self.records.get_mut(id) {
            apply(&mut record);
            record.updated_at = Utc::now();
        }
    }
}
