//! Settlement chain side of an anchored transfer
//!
//! Handles:
//! - Unit conversion into settlement-native value
//! - Finalizing the anchor transaction that authorizes an intention batch
//! - Bounded depth-confirmation polling of the anchor

pub mod confirmation;
pub mod units;

pub use confirmation::{
    PollingSettlementConfirmer, SettlementConfirmationPoller, SettlementStatusSource,
    SettlementWait,
};

use crate::error::{ExternalResult, StepResult, TransferError};
use crate::intent::Intention;

use async_trait::async_trait;
use ethers::types::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Settlement chain transaction authorizing a full intention batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorTransaction {
    pub txid: String,
    /// Serialized transaction, format owned by the external builder
    pub raw: Bytes,
}

/// External settlement transaction builder (input selection, fees, PSBT signing)
#[async_trait]
pub trait AnchorBuilder: Send + Sync {
    async fn finalize(&self, intentions: &[Intention]) -> ExternalResult<AnchorTransaction>;
}

/// Produces the anchor transaction for a batch. Never caches: inputs and fees
/// chosen by the builder may differ between attempts.
pub struct AnchorFinalizer {
    builder: Arc<dyn AnchorBuilder>,
}

impl AnchorFinalizer {
    pub fn new(builder: Arc<dyn AnchorBuilder>) -> Self {
        Self { builder }
    }

    pub async fn finalize(&self, intentions: &[Intention]) -> StepResult<AnchorTransaction> {
        let anchor = self.builder.finalize(intentions).await.map_err(|e| {
            warn!("Settlement builder failed: {}", e);
            TransferError::AnchorBuildFailed(e.to_string())
        })?;

        if anchor.txid.trim().is_empty() || anchor.raw.is_empty() {
            return Err(TransferError::AnchorBuildFailed(
                "builder returned an anchor without id or raw bytes".to_string(),
            ));
        }

        info!(
            "Anchor transaction {} finalized for {} intentions ({} bytes)",
            anchor.txid,
            intentions.len(),
            anchor.raw.len()
        );
        Ok(anchor)
    }
}
