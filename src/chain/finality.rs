//! Receipt-based confirmation of execution chain transactions
//!
//! A transaction counts as confirmed once its receipt exists and the chain
//! head is at least `confirmations - 1` blocks past the receipt's block.

use crate::chain::{ExecutionConfirmationPoller, ExecutionProvider, ExecutionReceipt};
use crate::error::{ExternalError, ExternalResult};

use async_trait::async_trait;
use ethers::types::{TransactionReceipt, H256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of receipts and chain height
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn receipt(&self, tx_hash: H256) -> ExternalResult<Option<TransactionReceipt>>;
    async fn block_number(&self) -> ExternalResult<u64>;
}

#[async_trait]
impl ReceiptSource for ExecutionProvider {
    async fn receipt(&self, tx_hash: H256) -> ExternalResult<Option<TransactionReceipt>> {
        self.get_transaction_receipt(tx_hash).await
    }

    async fn block_number(&self) -> ExternalResult<u64> {
        self.get_block_number().await
    }
}

/// Polls receipts until a transaction reaches the requested depth
pub struct ReceiptConfirmer<S> {
    source: Arc<S>,
    /// Delay between polls
    interval: Duration,
    /// Polls before giving up
    max_attempts: u32,
}

impl<S: ReceiptSource> ReceiptConfirmer<S> {
    pub fn new(source: Arc<S>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            source,
            interval,
            max_attempts,
        }
    }

    /// Single check: the receipt once it has enough confirmations
    async fn check(
        &self,
        tx_hash: H256,
        confirmations: u64,
    ) -> ExternalResult<Option<ExecutionReceipt>> {
        let Some(receipt) = self.source.receipt(tx_hash).await? else {
            return Ok(None);
        };
        let Some(tx_block) = receipt.block_number.map(|b| b.as_u64()) else {
            return Ok(None);
        };

        let current_block = self.source.block_number().await?;
        let depth = current_block.saturating_sub(tx_block) + 1;
        if depth < confirmations {
            debug!(
                "Transaction {:?} has {} / {} confirmations",
                tx_hash, depth, confirmations
            );
            return Ok(None);
        }

        Ok(Some(ExecutionReceipt {
            tx_hash,
            block_number: tx_block,
            success: receipt.status == Some(1u64.into()),
        }))
    }
}

#[async_trait]
impl<S: ReceiptSource> ExecutionConfirmationPoller for ReceiptConfirmer<S> {
    async fn await_confirmation(
        &self,
        tx_hash: H256,
        confirmations: u64,
    ) -> ExternalResult<ExecutionReceipt> {
        for attempt in 1..=self.max_attempts {
            match self.check(tx_hash, confirmations).await {
                Ok(Some(receipt)) => {
                    info!(
                        "Transaction {:?} confirmed in block {}",
                        tx_hash, receipt.block_number
                    );
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) => warn!("Receipt poll {} for {:?} failed: {}", attempt, tx_hash, e),
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(ExternalError::Timeout {
            operation: format!("receipt of {:?}", tx_hash),
        })
    }
}
