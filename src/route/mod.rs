//! Routed execution-chain transactions
//!
//! The router decides which execution-chain calls accomplish a transfer. Its
//! output is validated here into [`ExecutionOperation`]s.

use crate::error::{ExternalResult, StepResult, TransferError};
use crate::intent::ExecutionOperation;
use crate::transfer::TransferRequest;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Transaction family of a routed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutedKind {
    Evm,
    #[serde(other)]
    Unsupported,
}

/// One transaction as produced by the router, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedTransaction {
    pub kind: RoutedKind,
    pub to: Option<Address>,
    #[serde(default)]
    pub data: Bytes,
    pub value: Option<U256>,
}

/// External router producing the ordered calls for a transfer
#[async_trait]
pub trait TransferRouter: Send + Sync {
    async fn build_operations(&self, request: &TransferRequest)
        -> ExternalResult<Vec<RoutedTransaction>>;
}

/// Validate routed transactions into indexed execution operations
pub fn into_operations(routed: Vec<RoutedTransaction>) -> StepResult<Vec<ExecutionOperation>> {
    if routed.is_empty() {
        return Err(TransferError::NoRouteFound(
            "router returned no transactions".to_string(),
        ));
    }

    routed
        .into_iter()
        .enumerate()
        .map(|(index, tx)| {
            if tx.kind != RoutedKind::Evm {
                return Err(TransferError::UnsupportedOperationType(format!(
                    "transaction {} is not an execution chain call",
                    index
                )));
            }
            let to = tx.to.ok_or_else(|| {
                TransferError::UnsupportedOperationType(format!(
                    "transaction {} has no target address",
                    index
                ))
            })?;
            Ok(ExecutionOperation {
                index,
                to,
                data: tx.data,
                value: tx.value,
            })
        })
        .collect()
}
