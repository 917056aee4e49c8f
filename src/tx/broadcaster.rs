//! All-or-nothing submission of a signed batch with its anchor

use super::signer::SignedIntention;
use crate::error::{ExternalResult, StepResult, TransferError};
use crate::settlement::AnchorTransaction;

use async_trait::async_trait;
use ethers::types::Bytes;
use std::sync::Arc;
use tracing::{error, info};

/// Endpoint accepting a signed intention batch together with its anchor
#[async_trait]
pub trait BatchSubmitter: Send + Sync {
    async fn submit(&self, signed_txs: &[Bytes], anchor_raw: &Bytes) -> ExternalResult<()>;
}

/// Submits the full batch and the anchor as one call. A subset is never
/// submitted: the anchor only becomes valid once every intention it
/// references is known to the executor.
pub struct AtomicBroadcaster {
    submitter: Arc<dyn BatchSubmitter>,
}

impl AtomicBroadcaster {
    pub fn new(submitter: Arc<dyn BatchSubmitter>) -> Self {
        Self { submitter }
    }

    pub async fn broadcast(
        &self,
        anchor: &AnchorTransaction,
        signed: &[SignedIntention],
    ) -> StepResult<()> {
        verify_batch(anchor, signed)?;

        let signed_txs: Vec<Bytes> = signed.iter().map(|s| s.signed_tx.clone()).collect();
        self.submitter
            .submit(&signed_txs, &anchor.raw)
            .await
            .map_err(|e| {
                error!("Broadcast of anchor {} failed: {}", anchor.txid, e);
                TransferError::BroadcastFailed(e.to_string())
            })?;

        info!(
            "Broadcast anchor {} with {} signed intentions",
            anchor.txid,
            signed.len()
        );
        Ok(())
    }
}

/// Every signature must be bound to `anchor` and the batch must be complete and ordered
fn verify_batch(anchor: &AnchorTransaction, signed: &[SignedIntention]) -> StepResult<()> {
    if signed.is_empty() {
        return Err(TransferError::BroadcastFailed(
            "refusing to broadcast an empty batch".to_string(),
        ));
    }

    for (position, s) in signed.iter().enumerate() {
        if s.anchor_txid != anchor.txid {
            return Err(TransferError::BroadcastFailed(format!(
                "intention {} is signed for anchor {}, not {}",
                s.index, s.anchor_txid, anchor.txid
            )));
        }
        if s.index != position {
            return Err(TransferError::BroadcastFailed(format!(
                "intention at position {} carries index {}",
                position, s.index
            )));
        }
    }

    if !signed[signed.len() - 1].intention.is_completion() {
        return Err(TransferError::BroadcastFailed(
            "batch does not end with a completion intention".to_string(),
        ));
    }

    Ok(())
}
