//! Intention signing and atomic batch submission

mod broadcaster;
mod signer;

pub use broadcaster::{AtomicBroadcaster, BatchSubmitter};
pub use signer::{
    execution_tx_hash, BatchContext, IntentionSigner, SequentialSigner, SignatureProtocol,
    SignedIntention,
};
