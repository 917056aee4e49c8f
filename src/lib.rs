//! Anchored cross-chain transfer orchestration
//!
//! A transfer is a batch of execution-chain calls, each turned into a signed
//! intention, all authorized by one settlement-chain anchor transaction. The
//! batch is published atomically and confirmed on both chains.

pub mod api;
pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod metrics;
pub mod progress;
pub mod route;
pub mod settlement;
pub mod state;
pub mod transfer;
pub mod tx;

pub use coordination::{Collaborators, ConfirmationPolicy, TransferOrchestrator};
pub use error::{FailureKind, TransferError, TransferFailure};
pub use progress::{ProgressRegistry, ProgressSnapshot, TransferStage};
pub use transfer::{AssetRef, TransferRequest, TransferResult};
