//! Converts routed execution operations into an ordered intention batch

use super::{DepositInstruction, DepositPlan, ExecutionOperation, Intention};
use crate::error::{StepResult, TransferError};
use crate::settlement::units::to_settlement_units;
use crate::tx::IntentionSigner;

use ethers::types::U256;
use std::sync::Arc;
use tracing::debug;

/// Builds intention batches, clearing the signer's pending state first
pub struct IntentionBuilder {
    signer: Arc<dyn IntentionSigner>,
}

impl IntentionBuilder {
    pub fn new(signer: Arc<dyn IntentionSigner>) -> Self {
        Self { signer }
    }

    /// Build the batch for `operations`. Any intentions left pending by an
    /// earlier aborted attempt are discarded before building starts.
    pub async fn build(
        &self,
        operations: &[ExecutionOperation],
        plan: &DepositPlan,
    ) -> StepResult<Vec<Intention>> {
        self.signer
            .clear_pending()
            .await
            .map_err(TransferError::PendingIntentionsNotCleared)?;
        let intentions = build_intentions(operations, plan)?;
        debug!(
            "Built {} intentions for {} operations",
            intentions.len(),
            operations.len()
        );
        Ok(intentions)
    }
}

/// Wrap each operation in an intention, attach the deposit to the last
/// operation intention and close the batch with a completion intention.
pub fn build_intentions(
    operations: &[ExecutionOperation],
    plan: &DepositPlan,
) -> StepResult<Vec<Intention>> {
    let Some(last) = operations.len().checked_sub(1) else {
        return Err(TransferError::NoRouteFound(
            "router returned no execution operations".to_string(),
        ));
    };

    let mut intentions = Vec::with_capacity(operations.len() + 1);
    let mut total_value = U256::zero();

    for (i, operation) in operations.iter().enumerate() {
        if let Some(value) = operation.value {
            total_value = total_value.saturating_add(value);
        }

        let deposit = (i == last).then(|| DepositInstruction {
            settlement_amount: to_settlement_units(total_value),
            assets: plan.assets.clone(),
        });

        intentions.push(Intention::Operation {
            operation: operation.clone(),
            deposit,
        });
    }

    intentions.push(Intention::Completion);
    Ok(intentions)
}
