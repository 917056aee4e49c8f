//! Transfer orchestration across the execution and settlement chains
//!
//! The orchestrator:
//! 1. Obtains the ordered execution-chain calls from the router
//! 2. Sizes the settlement deposit and builds the intention batch
//! 3. Finalizes the anchor, signs every intention against it, broadcasts all at once
//! 4. Waits for settlement and then execution confirmations

pub mod confirm;
pub mod engine;

pub use confirm::{primary_hash, ConfirmationPolicy, ConfirmationWaiter};
pub use engine::{Collaborators, TransferOrchestrator};
