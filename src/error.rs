//! Error types for the anchored transfer orchestrator

use crate::progress::TransferStage;

use thiserror::Error;

/// Failure reported by an external collaborator (router, wallet, node RPC)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Invalid response: {0}")]
    Invalid(String),
}

impl ExternalError {
    /// Check if the counterparty (usually the wallet user) declined the request
    pub fn is_rejection(&self) -> bool {
        match self {
            ExternalError::Rejected(_) => true,
            ExternalError::Rpc(message) => {
                let message = message.to_lowercase();
                message.contains("user rejected") || message.contains("user denied")
            }
            _ => false,
        }
    }
}

/// Terminal failure of a single transfer attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("Deposit lookup failed for asset {asset}: {source}")]
    DepositLookupFailed {
        asset: String,
        #[source]
        source: ExternalError,
    },

    #[error("No route found: {0}")]
    NoRouteFound(String),

    #[error("Unsupported operation type: {0}")]
    UnsupportedOperationType(String),

    #[error("Invalid amount {amount:?}: {message}")]
    InvalidAmount { amount: String, message: String },

    #[error("Failed to clear pending intentions: {0}")]
    PendingIntentionsNotCleared(#[source] ExternalError),

    #[error("Anchor transaction build failed: {0}")]
    AnchorBuildFailed(String),

    #[error("Signature rejected for intention {index}: {source}")]
    SignatureRejected {
        index: usize,
        #[source]
        source: ExternalError,
    },

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Settlement transaction {txid} not confirmed after {attempts} attempts")]
    SettlementConfirmationTimeout { txid: String, attempts: u32 },

    #[error("Settlement confirmation of {txid} failed: {message}")]
    SettlementConfirmationFailed { txid: String, message: String },

    #[error("Execution confirmation failed for tx {tx_hash}: {message}")]
    ExecutionConfirmationFailed { tx_hash: String, message: String },
}

impl TransferError {
    /// Check if the failure was a deliberate decline by the signing wallet
    pub fn is_user_rejection(&self) -> bool {
        match self {
            TransferError::SignatureRejected { source, .. } => source.is_rejection(),
            TransferError::AnchorBuildFailed(message)
            | TransferError::BroadcastFailed(message) => {
                message.to_lowercase().contains("user rejected")
            }
            _ => false,
        }
    }

    /// Check if the failure happened after the batch was already published
    pub fn is_post_broadcast(&self) -> bool {
        matches!(
            self,
            TransferError::SettlementConfirmationTimeout { .. }
                | TransferError::SettlementConfirmationFailed { .. }
                | TransferError::ExecutionConfirmationFailed { .. }
        )
    }
}

/// How a caller should present a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The wallet declined; nothing was published
    UserRejected,
    /// Funds are committed, only the confirmation wait failed
    AwaitingConfirmation,
    /// The attempt failed before anything was published
    Failed,
}

/// A transfer error tagged with the stage at which it occurred
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} during {stage}: {error}", outcome_label(.error))]
pub struct TransferFailure {
    pub stage: TransferStage,
    #[source]
    pub error: TransferError,
}

impl TransferFailure {
    pub fn new(stage: TransferStage, error: TransferError) -> Self {
        Self { stage, error }
    }

    pub fn classify(&self) -> FailureKind {
        if self.error.is_user_rejection() {
            FailureKind::UserRejected
        } else if self.error.is_post_broadcast() {
            FailureKind::AwaitingConfirmation
        } else {
            FailureKind::Failed
        }
    }

    /// Message suitable for display to the person who initiated the transfer
    pub fn user_message(&self) -> String {
        match self.classify() {
            FailureKind::UserRejected => "Transaction rejected by wallet.".to_string(),
            FailureKind::AwaitingConfirmation => format!(
                "Transfer was broadcast but awaiting confirmation failed: {}",
                self.error
            ),
            FailureKind::Failed => stage_failure_message(self.stage).to_string(),
        }
    }
}

fn outcome_label(error: &TransferError) -> &'static str {
    if error.is_post_broadcast() {
        "transfer broadcast but awaiting confirmation failed"
    } else {
        "transfer failed"
    }
}

fn stage_failure_message(stage: TransferStage) -> &'static str {
    match stage {
        TransferStage::Preparing => "Error while preparing the transfer.",
        TransferStage::CreatingOperations => "Error while creating execution chain operations.",
        TransferStage::BuildingIntentions => "Error building transaction intentions.",
        TransferStage::FinalizingAnchor => "Error preparing the settlement transaction.",
        TransferStage::Signing => "Error signing with the settlement wallet.",
        TransferStage::Broadcasting => "Error broadcasting transactions.",
        TransferStage::Confirming => "Error confirming transfer.",
        _ => "Unable to complete the transfer.",
    }
}

/// Errors raised while bootstrapping the service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for a single transfer attempt
pub type StepResult<T> = Result<T, TransferError>;

/// Result type for collaborator calls
pub type ExternalResult<T> = Result<T, ExternalError>;
