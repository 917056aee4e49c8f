//! Transfer request and result types

use crate::error::{StepResult, TransferError};

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use ethers::utils::parse_units;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asset being moved, as resolved by the caller's token catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub symbol: String,
    pub decimals: u8,
    /// Execution-chain collateral token; absent for synthetic or native assets
    pub collateral_address: Option<Address>,
}

/// A single transfer attempt. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub id: Uuid,
    pub origin_chain: u64,
    pub destination_chain: u64,
    pub asset: AssetRef,
    /// Human-readable decimal amount, e.g. "1.5"
    pub amount: String,
    /// Destination-chain recipient, kept opaque since it may not be an EVM address
    pub recipient: String,
    pub sender: Address,
    pub created_at: DateTime<Utc>,
}

impl TransferRequest {
    pub fn new(
        origin_chain: u64,
        destination_chain: u64,
        asset: AssetRef,
        amount: impl Into<String>,
        recipient: impl Into<String>,
        sender: Address,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin_chain,
            destination_chain,
            asset,
            amount: amount.into(),
            recipient: recipient.into(),
            sender,
            created_at: Utc::now(),
        }
    }

    /// Amount in the asset's smallest unit
    pub fn base_amount(&self) -> StepResult<U256> {
        let amount = self.amount.trim();
        let invalid = |message: String| TransferError::InvalidAmount {
            amount: self.amount.clone(),
            message,
        };

        if amount.is_empty() {
            return Err(invalid("amount is empty".to_string()));
        }
        if amount.starts_with('-') {
            return Err(invalid("amount must not be negative".to_string()));
        }

        let units = parse_units(amount, self.asset.decimals as u32)
            .map_err(|e| invalid(e.to_string()))?;
        let value = U256::from(units);
        if value.is_zero() {
            return Err(invalid("amount must be greater than zero".to_string()));
        }
        Ok(value)
    }
}

/// Outcome of a confirmed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub transfer_id: Uuid,
    /// Hash of the last routed operation, i.e. the value-moving call
    pub primary_tx_hash: H256,
    pub anchor_txid: String,
    /// All execution hashes in submission order, completion included
    pub execution_tx_hashes: Vec<H256>,
}
