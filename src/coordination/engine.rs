//! Transfer orchestrator: runs one anchored transfer through every stage

use super::confirm::{ConfirmationPolicy, ConfirmationWaiter};
use crate::chain::{ChainReader, ExecutionConfirmationPoller};
use crate::error::{StepResult, TransferError, TransferFailure};
use crate::intent::{DepositCalculator, IntentionBuilder};
use crate::progress::{ProgressRegistry, ProgressStore, TransferStage};
use crate::route::{into_operations, TransferRouter};
use crate::settlement::{AnchorBuilder, AnchorFinalizer, SettlementConfirmationPoller};
use crate::state::TransferLedger;
use crate::transfer::{TransferRequest, TransferResult};
use crate::tx::{
    AtomicBroadcaster, BatchSubmitter, IntentionSigner, SequentialSigner, SignatureProtocol,
};

use chrono::{DateTime, Utc};

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// External collaborators an orchestrator delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub router: Arc<dyn TransferRouter>,
    pub reader: Arc<dyn ChainReader>,
    pub anchor_builder: Arc<dyn AnchorBuilder>,
    pub signer: Arc<dyn IntentionSigner>,
    pub submitter: Arc<dyn BatchSubmitter>,
    pub settlement_poller: Arc<dyn SettlementConfirmationPoller>,
    pub execution_poller: Arc<dyn ExecutionConfirmationPoller>,
}

/// Coordinates anchored transfers and owns their observable progress
pub struct TransferOrchestrator {
    router: Arc<dyn TransferRouter>,
    deposits: DepositCalculator,
    builder: IntentionBuilder,
    finalizer: AnchorFinalizer,
    signer: SequentialSigner,
    broadcaster: AtomicBroadcaster,
    waiter: ConfirmationWaiter,
    progress: Arc<ProgressRegistry>,
    ledger: Arc<TransferLedger>,
}

impl TransferOrchestrator {
    pub fn new(collaborators: Collaborators, policy: ConfirmationPolicy) -> Self {
        Self {
            router: collaborators.router,
            deposits: DepositCalculator::new(collaborators.reader),
            builder: IntentionBuilder::new(collaborators.signer.clone()),
            finalizer: AnchorFinalizer::new(collaborators.anchor_builder),
            signer: SequentialSigner::new(collaborators.signer),
            broadcaster: AtomicBroadcaster::new(collaborators.submitter),
            waiter: ConfirmationWaiter::new(
                collaborators.settlement_poller,
                collaborators.execution_poller,
                policy,
            ),
            progress: Arc::new(ProgressRegistry::new()),
            ledger: Arc::new(TransferLedger::new()),
        }
    }

    /// Request signatures from the settlement wallet using `protocol`
    pub fn with_signature_protocol(self, protocol: SignatureProtocol) -> Self {
        Self {
            signer: self.signer.with_protocol(protocol),
            ..self
        }
    }

    pub fn progress(&self) -> Arc<ProgressRegistry> {
        self.progress.clone()
    }

    pub fn ledger(&self) -> Arc<TransferLedger> {
        self.ledger.clone()
    }

    /// Forget finished transfers last updated before `cutoff`
    pub fn prune_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let pruned = self.ledger.prune_finished(cutoff);
        for id in &pruned {
            self.progress.remove(id);
        }
        pruned.len()
    }

    /// Run a transfer without a stage callback
    pub async fn execute(&self, request: &TransferRequest) -> Result<TransferResult, TransferFailure> {
        self.execute_transfer(request, |_| {}).await
    }

    /// Run `request` to completion. `on_stage` is invoked synchronously at every
    /// stage boundary, after the progress store has been updated.
    pub async fn execute_transfer<F>(
        &self,
        request: &TransferRequest,
        on_stage: F,
    ) -> Result<TransferResult, TransferFailure>
    where
        F: Fn(TransferStage) + Send + Sync,
    {
        let store = self.progress.tracker(request.id);
        store.reset();
        self.ledger.record_started(request);
        crate::metrics::record_transfer_started();

        info!(
            "Starting transfer {}: {} {} from chain {} to chain {}",
            request.id,
            request.amount,
            request.asset.symbol,
            request.origin_chain,
            request.destination_chain
        );

        let mut stages = StageTracker::new(request.id, store, &self.ledger, &on_stage);

        match self.run(request, &mut stages).await {
            Ok(result) => {
                stages.enter(TransferStage::Success);
                self.ledger.record_confirmed(&request.id, &result);
                crate::metrics::record_transfer_succeeded();
                Ok(result)
            }
            Err(err) => {
                let failure = stages.fail(err);
                self.ledger.record_failed(&request.id, &failure);
                Err(failure)
            }
        }
    }

    async fn run<F>(
        &self,
        request: &TransferRequest,
        stages: &mut StageTracker<'_, F>,
    ) -> StepResult<TransferResult>
    where
        F: Fn(TransferStage) + Send + Sync,
    {
        stages.enter(TransferStage::Preparing);
        let amount = request.base_amount()?;

        stages.enter(TransferStage::CreatingOperations);
        let routed = self
            .router
            .build_operations(request)
            .await
            .map_err(|e| TransferError::NoRouteFound(e.to_string()))?;
        let operations = into_operations(routed)?;
        debug!(
            "Router produced {} operations for transfer {}",
            operations.len(),
            request.id
        );

        stages.enter(TransferStage::BuildingIntentions);
        let plan = self
            .deposits
            .calculate(request.asset.collateral_address, request.sender, amount)
            .await?;
        let intentions = self.builder.build(&operations, &plan).await?;

        stages.enter(TransferStage::FinalizingAnchor);
        let anchor = self.finalizer.finalize(&intentions).await?;

        stages.enter(TransferStage::Signing);
        let signed = self.signer.sign_all(&anchor, &intentions).await?;

        stages.enter(TransferStage::Broadcasting);
        self.broadcaster.broadcast(&anchor, &signed).await?;
        self.ledger.record_broadcast(&request.id, &anchor.txid, &signed);

        stages.enter(TransferStage::Confirming);
        self.waiter.wait(request.id, &anchor.txid, &signed).await
    }
}

/// Tracks the active stage of one attempt and publishes every transition
struct StageTracker<'a, F> {
    transfer_id: Uuid,
    store: ProgressStore,
    ledger: &'a TransferLedger,
    on_stage: &'a F,
    current: TransferStage,
    entered_at: Instant,
}

impl<'a, F> StageTracker<'a, F>
where
    F: Fn(TransferStage) + Send + Sync,
{
    fn new(transfer_id: Uuid, store: ProgressStore, ledger: &'a TransferLedger, on_stage: &'a F) -> Self {
        Self {
            transfer_id,
            store,
            ledger,
            on_stage,
            current: TransferStage::Idle,
            entered_at: Instant::now(),
        }
    }

    fn enter(&mut self, stage: TransferStage) {
        if self.current != TransferStage::Idle {
            crate::metrics::record_stage_latency(
                self.current,
                self.entered_at.elapsed().as_secs_f64(),
            );
        }
        self.current = stage;
        self.entered_at = Instant::now();

        self.store.set_stage(stage);
        self.ledger.update_stage(&self.transfer_id, stage);
        (self.on_stage)(stage);
        debug!("Transfer {} entered stage {}", self.transfer_id, stage);
    }

    /// Tag `error` with the active stage, record it and move to `error`
    fn fail(&mut self, error: TransferError) -> TransferFailure {
        let failure = TransferFailure::new(self.current, error);
        error!("Transfer {} failed: {}", self.transfer_id, failure);
        crate::metrics::record_transfer_failed(self.current);

        self.store.set_error(Some(failure.user_message()));
        self.store.set_stage(TransferStage::Error);
        self.ledger.update_stage(&self.transfer_id, TransferStage::Error);
        (self.on_stage)(TransferStage::Error);
        failure
    }
}
