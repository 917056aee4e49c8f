//! Sequential intention signing bound to a single anchor transaction

use crate::error::{ExternalResult, StepResult, TransferError};
use crate::intent::Intention;
use crate::settlement::AnchorTransaction;

use async_trait::async_trait;
use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message signing scheme used by the settlement wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureProtocol {
    Bip322,
    Ecdsa,
}

/// An intention signed against a specific anchor transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIntention {
    pub index: usize,
    pub intention: Intention,
    /// Serialized execution-chain transaction as returned by the wallet
    pub signed_tx: Bytes,
    pub anchor_txid: String,
    pub tx_hash: H256,
}

/// Execution-chain hash of a signed transaction
pub fn execution_tx_hash(signed_tx: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(signed_tx))
}

/// Per-batch signing state. The wallet may accumulate state across calls, so
/// each signature is requested with the signatures already produced for the
/// preceding intentions of the same anchor.
#[derive(Debug)]
pub struct BatchContext {
    anchor_txid: String,
    protocol: SignatureProtocol,
    signed: Vec<SignedIntention>,
}

impl BatchContext {
    fn new(anchor_txid: String, protocol: SignatureProtocol) -> Self {
        Self {
            anchor_txid,
            protocol,
            signed: Vec::new(),
        }
    }

    pub fn anchor_txid(&self) -> &str {
        &self.anchor_txid
    }

    pub fn protocol(&self) -> SignatureProtocol {
        self.protocol
    }

    /// Signatures produced so far, in intention order
    pub fn signed(&self) -> &[SignedIntention] {
        &self.signed
    }

    /// Index of the intention being signed next
    pub fn next_index(&self) -> usize {
        self.signed.len()
    }

    fn record(&mut self, intention: &Intention, signed_tx: Bytes) -> &SignedIntention {
        let signed = SignedIntention {
            index: self.next_index(),
            intention: intention.clone(),
            tx_hash: execution_tx_hash(&signed_tx),
            signed_tx,
            anchor_txid: self.anchor_txid.clone(),
        };
        self.signed.push(signed);
        &self.signed[self.signed.len() - 1]
    }
}

/// Settlement wallet able to sign execution-chain intentions
#[async_trait]
pub trait IntentionSigner: Send + Sync {
    /// Drop any intentions left pending in the wallet by an earlier attempt
    async fn clear_pending(&self) -> ExternalResult<()>;

    /// Sign `intention`, one of `intentions`, for the anchor in `ctx`
    async fn sign(
        &self,
        ctx: &BatchContext,
        intention: &Intention,
        intentions: &[Intention],
    ) -> ExternalResult<Bytes>;
}

/// Signs every intention of a batch strictly in order
pub struct SequentialSigner {
    signer: Arc<dyn IntentionSigner>,
    protocol: SignatureProtocol,
}

impl SequentialSigner {
    pub fn new(signer: Arc<dyn IntentionSigner>) -> Self {
        Self {
            signer,
            protocol: SignatureProtocol::Bip322,
        }
    }

    pub fn with_protocol(mut self, protocol: SignatureProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sign all intentions against `anchor`. The first rejection aborts the
    /// batch and every signature produced so far is dropped.
    pub async fn sign_all(
        &self,
        anchor: &AnchorTransaction,
        intentions: &[Intention],
    ) -> StepResult<Vec<SignedIntention>> {
        let mut ctx = BatchContext::new(anchor.txid.clone(), self.protocol);

        for intention in intentions {
            let index = ctx.next_index();
            let signed_tx = self
                .signer
                .sign(&ctx, intention, intentions)
                .await
                .map_err(|source| {
                    warn!(
                        "Signing intention {}/{} for anchor {} failed: {}",
                        index + 1,
                        intentions.len(),
                        anchor.txid,
                        source
                    );
                    TransferError::SignatureRejected { index, source }
                })?;

            let signed = ctx.record(intention, signed_tx);
            debug!("Signed intention {} -> {:?}", index, signed.tx_hash);
            crate::metrics::record_intention_signed();
        }

        info!(
            "Signed {} intentions against anchor {}",
            ctx.signed.len(),
            anchor.txid
        );
        Ok(ctx.signed)
    }
}
