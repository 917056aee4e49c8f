//! Per-transfer progress tracking
//!
//! Each transfer attempt owns a [`ProgressStore`] holding a single
//! [`ProgressSnapshot`]. Updates go through a watch channel, so readers always
//! observe one consistent snapshot and can subscribe to changes.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stage of a transfer pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferStage {
    Idle,
    Preparing,
    CreatingOperations,
    BuildingIntentions,
    FinalizingAnchor,
    Signing,
    Broadcasting,
    Confirming,
    Success,
    Error,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Idle => "idle",
            TransferStage::Preparing => "preparing",
            TransferStage::CreatingOperations => "creatingOperations",
            TransferStage::BuildingIntentions => "buildingIntentions",
            TransferStage::FinalizingAnchor => "finalizingAnchor",
            TransferStage::Signing => "signing",
            TransferStage::Broadcasting => "broadcasting",
            TransferStage::Confirming => "confirming",
            TransferStage::Success => "success",
            TransferStage::Error => "error",
        }
    }

    /// `success` and `error` end a lifecycle until the next reset
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStage::Success | TransferStage::Error)
    }

    fn position(&self) -> u8 {
        match self {
            TransferStage::Idle => 0,
            TransferStage::Preparing => 1,
            TransferStage::CreatingOperations => 2,
            TransferStage::BuildingIntentions => 3,
            TransferStage::FinalizingAnchor => 4,
            TransferStage::Signing => 5,
            TransferStage::Broadcasting => 6,
            TransferStage::Confirming => 7,
            TransferStage::Success | TransferStage::Error => 8,
        }
    }

    /// Check whether moving from `self` to `next` respects the forward-only lifecycle
    pub fn can_advance_to(&self, next: TransferStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TransferStage::Error => true,
            TransferStage::Idle => false,
            _ => next.position() > self.position(),
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consistent view of a transfer's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub stage: TransferStage,
    pub error: Option<String>,
    /// Most recent stage other than `idle` and `error`
    pub last_stage: Option<TransferStage>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            stage: TransferStage::Idle,
            error: None,
            last_stage: None,
        }
    }
}

/// Observable progress state of one transfer
#[derive(Clone)]
pub struct ProgressStore {
    state: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProgressSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Move to `stage`. Entering `error` keeps `last_stage`, entering `idle` clears the error.
    pub fn set_stage(&self, stage: TransferStage) {
        self.state.send_modify(|snapshot| {
            if !snapshot.stage.can_advance_to(stage) && stage != TransferStage::Idle {
                warn!("Progress moved backwards from {} to {}", snapshot.stage, stage);
            }
            snapshot.stage = stage;
            match stage {
                TransferStage::Error => {}
                TransferStage::Idle => snapshot.error = None,
                _ => snapshot.last_stage = Some(stage),
            }
        });
    }

    /// Record an error message without touching the stage
    pub fn set_error(&self, error: Option<String>) {
        self.state.send_modify(|snapshot| snapshot.error = error);
    }

    pub fn reset(&self) {
        self.state.send_replace(ProgressSnapshot::default());
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.state.subscribe()
    }
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress stores keyed by transfer id
#[derive(Default)]
pub struct ProgressRegistry {
    stores: DashMap<Uuid, ProgressStore>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self {
            stores: DashMap::new(),
        }
    }

    /// Get the store for a transfer, creating a fresh `idle` one if needed
    pub fn tracker(&self, transfer_id: Uuid) -> ProgressStore {
        self.stores
            .entry(transfer_id)
            .or_insert_with(|| {
                debug!("Tracking progress for transfer {}", transfer_id);
                ProgressStore::new()
            })
            .clone()
    }

    pub fn snapshot(&self, transfer_id: &Uuid) -> Option<ProgressSnapshot> {
        self.stores.get(transfer_id).map(|store| store.snapshot())
    }

    pub fn subscribe(&self, transfer_id: &Uuid) -> Option<watch::Receiver<ProgressSnapshot>> {
        self.stores.get(transfer_id).map(|store| store.subscribe())
    }

    /// Reset a transfer back to `idle`. Returns false for unknown transfers.
    pub fn reset(&self, transfer_id: &Uuid) -> bool {
        match self.stores.get(transfer_id) {
            Some(store) => {
                store.reset();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, transfer_id: &Uuid) {
        self.stores.remove(transfer_id);
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
