//! Transfer state kept alongside progress
//!
//! Handles:
//! - Request summaries per transfer
//! - Anchor and primary hash once published
//! - Per-status statistics

mod ledger;

pub use ledger::{TransferLedger, TransferRecord, TransferStats, TransferStatus};
