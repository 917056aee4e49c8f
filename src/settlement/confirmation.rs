//! Bounded depth-confirmation polling for settlement transactions

use crate::error::ExternalResult;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a bounded settlement confirmation wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementWait {
    Confirmed { confirmations: u64 },
    TimedOut { attempts: u32 },
}

/// Waits until a settlement transaction reaches `depth` confirmations,
/// polling at most `max_attempts` times, `interval` apart
#[async_trait]
pub trait SettlementConfirmationPoller: Send + Sync {
    async fn await_confirmation(
        &self,
        txid: &str,
        depth: u64,
        max_attempts: u32,
        interval: Duration,
    ) -> ExternalResult<SettlementWait>;
}

/// Reports the confirmation count of settlement transactions
#[async_trait]
pub trait SettlementStatusSource: Send + Sync {
    /// `None` while the transaction is unknown to the queried node
    async fn confirmations(&self, txid: &str) -> ExternalResult<Option<u64>>;
}

#[async_trait]
impl<T: SettlementStatusSource + ?Sized> SettlementStatusSource for Arc<T> {
    async fn confirmations(&self, txid: &str) -> ExternalResult<Option<u64>> {
        (**self).confirmations(txid).await
    }
}

/// Confirmation poller over a [`SettlementStatusSource`]
pub struct PollingSettlementConfirmer<S> {
    source: S,
}

impl<S: SettlementStatusSource> PollingSettlementConfirmer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: SettlementStatusSource> SettlementConfirmationPoller for PollingSettlementConfirmer<S> {
    async fn await_confirmation(
        &self,
        txid: &str,
        depth: u64,
        max_attempts: u32,
        interval: Duration,
    ) -> ExternalResult<SettlementWait> {
        for attempt in 1..=max_attempts {
            match self.source.confirmations(txid).await {
                Ok(Some(confirmations)) if confirmations >= depth => {
                    info!(
                        "Settlement tx {} confirmed ({} confirmations, attempt {}/{})",
                        txid, confirmations, attempt, max_attempts
                    );
                    return Ok(SettlementWait::Confirmed { confirmations });
                }
                Ok(confirmations) => {
                    debug!(
                        "Settlement tx {} has {} / {} confirmations (attempt {}/{})",
                        txid,
                        confirmations.unwrap_or(0),
                        depth,
                        attempt,
                        max_attempts
                    );
                }
                // Transient node errors count as an attempt
                Err(e) => {
                    warn!(
                        "Failed to query settlement tx {} (attempt {}/{}): {}",
                        txid, attempt, max_attempts, e
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        warn!(
            "Settlement tx {} not confirmed after {} attempts",
            txid, max_attempts
        );
        Ok(SettlementWait::TimedOut {
            attempts: max_attempts,
        })
    }
}
