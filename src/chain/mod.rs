//! Execution chain access
//!
//! This module provides:
//! - The read and confirmation interfaces the orchestrator consumes
//! - An ethers-backed provider with multi-RPC failover implementing them
//! - Receipt-based confirmation polling

pub mod finality;
pub mod provider;

pub use finality::{ReceiptConfirmer, ReceiptSource};
pub use provider::{decode_rune_id, ExecutionProvider};

use crate::error::ExternalResult;
use crate::intent::AssetId;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Read-only execution chain queries used to size deposits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Settlement-native asset mirrored by `asset`, if any
    async fn read_asset(&self, asset: Address) -> ExternalResult<Option<AssetId>>;

    /// Balance of `owner` in the token at `asset`
    async fn read_balance(&self, asset: Address, owner: Address) -> ExternalResult<U256>;
}

/// Receipt of an execution chain transaction that reached the requested depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub success: bool,
}

/// Waits for an execution chain transaction to reach a confirmation depth.
/// Implementations own their polling and timeout policy.
#[async_trait]
pub trait ExecutionConfirmationPoller: Send + Sync {
    async fn await_confirmation(
        &self,
        tx_hash: H256,
        confirmations: u64,
    ) -> ExternalResult<ExecutionReceipt>;
}
