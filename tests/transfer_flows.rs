mod harness;

use anchor_transfer::error::{ExternalError, FailureKind, TransferError};
use anchor_transfer::intent::AssetId;
use anchor_transfer::progress::TransferStage;
use anchor_transfer::settlement::units::to_settlement_units;
use anchor_transfer::state::TransferStatus;
use anchor_transfer::tx::execution_tx_hash;

use ethers::types::U256;
use harness::mocks::{anchor_txid, signed_bytes, ANCHOR_TXID};
use harness::{collateral, evm_call, request, sender, Harness};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_single_operation_without_deficit() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    h.chain.mirror(collateral(), "840000:3");
    h.chain.set_balance(collateral(), sender(), 100);
    let orchestrator = h.orchestrator();
    let request = request("100");

    let result = assert_ok!(orchestrator.execute(&request).await);

    let batches = h.anchor.batches.lock().unwrap().clone();
    assert_eq!(batches.len(), 1);
    let intentions = &batches[0];
    assert_eq!(intentions.len(), 2);
    assert!(intentions[1].is_completion());
    let deposit = intentions[0].deposit().unwrap();
    assert!(deposit.assets.is_empty());
    assert!(deposit.settlement_amount.is_zero());

    assert_eq!(
        result.primary_tx_hash,
        execution_tx_hash(&signed_bytes(ANCHOR_TXID, 0))
    );
    assert_eq!(result.anchor_txid, ANCHOR_TXID);
    assert_eq!(result.execution_tx_hashes.len(), 2);
    assert_eq!(h.signer.cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mirrored_asset_deficit_rides_on_last_operation() {
    let h = Harness::new(vec![evm_call(0x01, None), evm_call(0x02, Some(30_000_000_000))]);
    h.chain.mirror(collateral(), "840000:3");
    h.chain.set_balance(collateral(), sender(), 40);
    let orchestrator = h.orchestrator();

    let result = orchestrator.execute(&request("100")).await.unwrap();

    let intentions = h.anchor.batches.lock().unwrap()[0].clone();
    assert_eq!(intentions.len(), 3);
    assert_eq!(intentions[0].deposit(), None);

    let deposit = intentions[1].deposit().unwrap();
    assert_eq!(deposit.assets.len(), 1);
    assert_eq!(deposit.assets[0].asset_id, AssetId("840000:3".to_string()));
    assert_eq!(deposit.assets[0].amount, U256::from(60));
    assert_eq!(deposit.assets[0].asset_address, collateral());
    assert_eq!(
        deposit.settlement_amount,
        to_settlement_units(U256::from(30_000_000_000u64))
    );
    assert_eq!(deposit.settlement_amount, U256::from(3));

    assert_eq!(
        result.primary_tx_hash,
        execution_tx_hash(&signed_bytes(ANCHOR_TXID, 1))
    );
}

#[tokio::test]
async fn test_signer_rejection_aborts_before_broadcast() {
    let h = Harness::new(vec![evm_call(0x01, None), evm_call(0x02, None)]);
    h.signer.reject_at(1);
    let orchestrator = h.orchestrator();
    let request = request("5");

    let failure = orchestrator.execute(&request).await.unwrap_err();

    assert_eq!(failure.stage, TransferStage::Signing);
    assert!(matches!(
        failure.error,
        TransferError::SignatureRejected { index: 1, .. }
    ));
    assert_eq!(failure.classify(), FailureKind::UserRejected);
    assert_eq!(h.submission_count(), 0);
    assert!(h.execution.awaited.lock().unwrap().is_empty());

    let snapshot = orchestrator.progress().snapshot(&request.id).unwrap();
    assert_eq!(snapshot.stage, TransferStage::Error);
    assert_eq!(snapshot.last_stage, Some(TransferStage::Signing));
    assert!(snapshot.error.is_some());

    let record = orchestrator.ledger().get(&request.id).unwrap();
    assert_eq!(record.status, TransferStatus::Failed);
    assert_eq!(record.anchor_txid, None);
}

#[tokio::test(start_paused = true)]
async fn test_settlement_timeout_never_waits_on_execution() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    h.settlement.set(Some(0));
    let orchestrator = h.orchestrator();
    let request = request("1");

    let started = tokio::time::Instant::now();
    let failure = orchestrator.execute(&request).await.unwrap_err();

    // 60 polls with 10 s between consecutive polls
    assert_eq!(started.elapsed(), Duration::from_secs(590));
    assert_eq!(h.settlement.polls.load(Ordering::SeqCst), 60);
    assert!(h.execution.awaited.lock().unwrap().is_empty());

    assert_eq!(failure.stage, TransferStage::Confirming);
    assert!(matches!(
        failure.error,
        TransferError::SettlementConfirmationTimeout { attempts: 60, .. }
    ));
    assert_eq!(failure.classify(), FailureKind::AwaitingConfirmation);

    let snapshot = orchestrator.progress().snapshot(&request.id).unwrap();
    assert_eq!(snapshot.stage, TransferStage::Error);
    assert_eq!(snapshot.last_stage, Some(TransferStage::Confirming));
    let message = snapshot.error.unwrap();
    assert!(message.contains("awaiting confirmation failed"));
    assert!(message.contains("not confirmed after 60 attempts"));
    assert!(!message.to_lowercase().contains("rejected"));
    assert!(!message.contains("transfer failed"));

    // The batch is already published
    assert_eq!(h.submission_count(), 1);
    let record = orchestrator.ledger().get(&request.id).unwrap();
    assert_eq!(record.status, TransferStatus::ConfirmationFailed);
    assert_eq!(record.anchor_txid.as_deref(), Some(ANCHOR_TXID));
    assert!(!record.error.unwrap().contains("transfer failed"));
    let stats = orchestrator.ledger().stats();
    assert_eq!((stats.confirmation_failed, stats.failed), (1, 0));
}

#[tokio::test]
async fn test_uncleared_wallet_state_stops_before_finalizing() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    h.signer.fail_clear(ExternalError::Timeout {
        operation: "anchor_clearPendingIntentions".to_string(),
    });
    let orchestrator = h.orchestrator();
    let request = request("1");

    let failure = orchestrator.execute(&request).await.unwrap_err();

    assert_eq!(failure.stage, TransferStage::BuildingIntentions);
    assert!(matches!(
        failure.error,
        TransferError::PendingIntentionsNotCleared(ExternalError::Timeout { .. })
    ));
    assert_eq!(failure.classify(), FailureKind::Failed);
    assert_eq!(h.signer.cleared.load(Ordering::SeqCst), 1);
    assert!(h.anchor.batches.lock().unwrap().is_empty());
    assert!(h.signer.requests.lock().unwrap().is_empty());
    assert_eq!(h.submission_count(), 0);
    assert_eq!(
        orchestrator.progress().snapshot(&request.id).unwrap().error.as_deref(),
        Some("Error building transaction intentions.")
    );
}

#[tokio::test]
async fn test_stage_callback_sees_every_boundary_in_order() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    let orchestrator = h.orchestrator();
    let request = request("1");
    let progress = orchestrator.progress();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorded = seen.clone();
    let id = request.id;
    orchestrator
        .execute_transfer(&request, move |stage| {
            // The store is updated before the callback runs
            assert_eq!(progress.snapshot(&id).unwrap().stage, stage);
            recorded.lock().unwrap().push(stage);
        })
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![
            TransferStage::Preparing,
            TransferStage::CreatingOperations,
            TransferStage::BuildingIntentions,
            TransferStage::FinalizingAnchor,
            TransferStage::Signing,
            TransferStage::Broadcasting,
            TransferStage::Confirming,
            TransferStage::Success,
        ]
    );
}

#[tokio::test]
async fn test_signing_threads_batch_context_in_order() {
    let h = Harness::new(vec![evm_call(0x01, None), evm_call(0x02, None), evm_call(0x03, None)]);
    let orchestrator = h.orchestrator();

    orchestrator.execute(&request("1")).await.unwrap();

    assert_eq!(
        h.signer.requests.lock().unwrap().clone(),
        vec![(0, 0), (1, 1), (2, 2), (3, 3)]
    );
    let submissions = h.submitter.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let expected: Vec<_> = (0..4).map(|i| signed_bytes(ANCHOR_TXID, i)).collect();
    assert_eq!(submissions[0].0, expected);
}

#[tokio::test]
async fn test_empty_route_is_rejected_before_deposit_lookup() {
    let h = Harness::new(Vec::new());
    h.chain.mirror(collateral(), "1:1");
    let orchestrator = h.orchestrator();

    let failure = orchestrator.execute(&request("1")).await.unwrap_err();

    assert_eq!(failure.stage, TransferStage::CreatingOperations);
    assert!(matches!(failure.error, TransferError::NoRouteFound(_)));
    assert!(h.anchor.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_amount_fails_in_preparation() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    let orchestrator = h.orchestrator();

    let failure = assert_err!(orchestrator.execute(&request("0")).await);

    assert_eq!(failure.stage, TransferStage::Preparing);
    assert!(matches!(failure.error, TransferError::InvalidAmount { .. }));
    assert_eq!(h.router.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retry_after_failure_starts_from_idle() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    h.signer.reject_at(0);
    let orchestrator = h.orchestrator();
    let request = request("1");

    orchestrator.execute(&request).await.unwrap_err();
    let mut updates = orchestrator.progress().subscribe(&request.id).unwrap();

    *h.signer.requests.lock().unwrap() = Vec::new();
    h.signer.reject_at(usize::MAX);
    orchestrator.execute(&request).await.unwrap();

    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.stage, TransferStage::Success);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.last_stage, Some(TransferStage::Success));
    assert_eq!(
        orchestrator.ledger().get(&request.id).unwrap().status,
        TransferStatus::Confirmed
    );
}

#[tokio::test]
async fn test_concurrent_transfers_keep_separate_progress() {
    let ok = Harness::new(vec![evm_call(0x01, None)]);
    let orchestrator = Arc::new(ok.orchestrator());
    let first = request("1");
    let second = request("0");

    let (a, b) = tokio::join!(orchestrator.execute(&first), orchestrator.execute(&second));

    assert!(a.is_ok());
    assert!(b.is_err());
    let progress = orchestrator.progress();
    assert_eq!(
        progress.snapshot(&first.id).unwrap().stage,
        TransferStage::Success
    );
    let failed = progress.snapshot(&second.id).unwrap();
    assert_eq!(failed.stage, TransferStage::Error);
    assert_eq!(failed.last_stage, Some(TransferStage::Preparing));

    let stats = orchestrator.ledger().stats();
    assert_eq!((stats.confirmed, stats.failed), (1, 1));
}

#[tokio::test]
async fn test_concurrent_batches_are_signed_in_their_own_order() {
    let h = Harness::new(vec![evm_call(0x01, None), evm_call(0x02, None), evm_call(0x03, None)]);
    let orchestrator = h.orchestrator();
    let first = request("1");
    let second = request("2");

    let (a, b) = tokio::join!(orchestrator.execute(&first), orchestrator.execute(&second));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.anchor_txid, b.anchor_txid);

    // Both batches were in flight at once
    let requests = h.signer.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 8);
    assert_ne!(requests[..4], [(0, 0), (1, 1), (2, 2), (3, 3)]);

    let ordered = vec![(0, 0), (1, 1), (2, 2), (3, 3)];
    let by_anchor = h.signer.by_anchor.lock().unwrap().clone();
    assert_eq!(by_anchor.len(), 2);
    for txid in [anchor_txid(0), anchor_txid(1)] {
        assert_eq!(by_anchor[&txid], ordered, "anchor {}", txid);
    }

    let submitted: Vec<_> = h
        .submitter
        .submissions
        .lock()
        .unwrap()
        .iter()
        .map(|(txs, _)| txs.clone())
        .collect();
    assert_eq!(submitted.len(), 2);
    for txid in [anchor_txid(0), anchor_txid(1)] {
        let expected: Vec<_> = (0..4).map(|i| signed_bytes(&txid, i)).collect();
        assert!(submitted.contains(&expected), "anchor {}", txid);
    }

    for result in [&a, &b] {
        assert_eq!(
            result.primary_tx_hash,
            execution_tx_hash(&signed_bytes(&result.anchor_txid, 2))
        );
    }
}

#[tokio::test]
async fn test_pruning_forgets_finished_transfers() {
    let h = Harness::new(vec![evm_call(0x01, None)]);
    let orchestrator = h.orchestrator();
    let request = request("1");
    orchestrator.execute(&request).await.unwrap();

    assert_eq!(orchestrator.prune_finished(chrono::Utc::now() - chrono::Duration::hours(1)), 0);
    assert_eq!(orchestrator.prune_finished(chrono::Utc::now() + chrono::Duration::seconds(1)), 1);

    assert!(orchestrator.ledger().get(&request.id).is_none());
    assert!(orchestrator.progress().snapshot(&request.id).is_none());
    assert!(orchestrator.progress().is_empty());
}
