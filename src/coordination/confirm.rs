//! Two-phase confirmation of a broadcast batch
//!
//! Phase 1 waits for the anchor to reach its settlement depth. Only then are
//! the derived execution-chain transactions awaited, all concurrently.

use crate::chain::{ExecutionConfirmationPoller, ExecutionReceipt};
use crate::error::{StepResult, TransferError};
use crate::settlement::{SettlementConfirmationPoller, SettlementWait};
use crate::transfer::TransferResult;
use crate::tx::SignedIntention;

use ethers::types::H256;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Depths and polling bounds used while confirming a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub settlement_depth: u64,
    pub settlement_max_attempts: u32,
    pub settlement_interval: Duration,
    pub execution_confirmations: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            settlement_depth: 1,
            settlement_max_attempts: 60,
            settlement_interval: Duration::from_millis(10_000),
            execution_confirmations: 1,
        }
    }
}

/// Hash of the value-moving call: the last one before the completion intention
pub fn primary_hash(hashes: &[H256]) -> Option<H256> {
    hashes.len().checked_sub(2).map(|i| hashes[i])
}

/// Waits for a broadcast batch to confirm on both chains
pub struct ConfirmationWaiter {
    settlement: Arc<dyn SettlementConfirmationPoller>,
    execution: Arc<dyn ExecutionConfirmationPoller>,
    policy: ConfirmationPolicy,
}

impl ConfirmationWaiter {
    pub fn new(
        settlement: Arc<dyn SettlementConfirmationPoller>,
        execution: Arc<dyn ExecutionConfirmationPoller>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            settlement,
            execution,
            policy,
        }
    }

    pub async fn wait(
        &self,
        transfer_id: Uuid,
        anchor_txid: &str,
        signed: &[SignedIntention],
    ) -> StepResult<TransferResult> {
        let hashes: Vec<H256> = signed.iter().map(|s| s.tx_hash).collect();
        let primary_tx_hash = primary_hash(&hashes).ok_or_else(|| {
            TransferError::NoRouteFound("batch has no primary operation".to_string())
        })?;

        self.wait_settlement(anchor_txid).await?;
        self.wait_execution(&hashes).await?;

        info!(
            "Transfer {} confirmed: anchor {}, primary tx {:?}",
            transfer_id, anchor_txid, primary_tx_hash
        );
        Ok(TransferResult {
            transfer_id,
            primary_tx_hash,
            anchor_txid: anchor_txid.to_string(),
            execution_tx_hashes: hashes,
        })
    }

    async fn wait_settlement(&self, anchor_txid: &str) -> StepResult<()> {
        let outcome = self
            .settlement
            .await_confirmation(
                anchor_txid,
                self.policy.settlement_depth,
                self.policy.settlement_max_attempts,
                self.policy.settlement_interval,
            )
            .await
            .map_err(|e| TransferError::SettlementConfirmationFailed {
                txid: anchor_txid.to_string(),
                message: e.to_string(),
            })?;

        match outcome {
            SettlementWait::Confirmed { confirmations } => {
                debug!(
                    "Anchor {} reached {} confirmations",
                    anchor_txid, confirmations
                );
                Ok(())
            }
            SettlementWait::TimedOut { attempts } => {
                Err(TransferError::SettlementConfirmationTimeout {
                    txid: anchor_txid.to_string(),
                    attempts,
                })
            }
        }
    }

    /// Wait for every hash concurrently. Each wait runs as its own task, so
    /// returning on the first failure leaves the remaining waits running.
    async fn wait_execution(&self, hashes: &[H256]) -> StepResult<Vec<ExecutionReceipt>> {
        let confirmations = self.policy.execution_confirmations;
        let mut waits: FuturesUnordered<_> = hashes
            .iter()
            .enumerate()
            .map(|(position, &hash)| {
                let poller = self.execution.clone();
                let handle = tokio::spawn(async move {
                    poller.await_confirmation(hash, confirmations).await
                });
                async move { (position, hash, handle.await) }
            })
            .collect();

        let mut receipts: Vec<Option<ExecutionReceipt>> = vec![None; hashes.len()];
        while let Some((position, hash, joined)) = waits.next().await {
            let failed = |message: String| {
                warn!("Execution tx {:?} failed to confirm: {}", hash, message);
                TransferError::ExecutionConfirmationFailed {
                    tx_hash: format!("{:?}", hash),
                    message,
                }
            };

            let receipt = match joined {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(e)) => return Err(failed(e.to_string())),
                Err(e) => return Err(failed(format!("confirmation task aborted: {}", e))),
            };
            if !receipt.success {
                return Err(failed(format!(
                    "transaction reverted in block {}",
                    receipt.block_number
                )));
            }
            receipts[position] = Some(receipt);
        }

        Ok(receipts.into_iter().flatten().collect())
    }
}
