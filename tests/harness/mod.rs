//! Shared setup for end-to-end tests

#![allow(dead_code)]

pub mod mocks;

use anchor_transfer::coordination::{Collaborators, ConfirmationPolicy, TransferOrchestrator};
use anchor_transfer::route::{RoutedKind, RoutedTransaction};
use anchor_transfer::settlement::PollingSettlementConfirmer;
use anchor_transfer::transfer::{AssetRef, TransferRequest};

use ethers::types::{Address, Bytes, U256};
use mocks::*;
use std::sync::Arc;

pub fn collateral() -> Address {
    Address::repeat_byte(0xc0)
}

pub fn sender() -> Address {
    Address::repeat_byte(0x5e)
}

/// An execution call as the router would return it
pub fn evm_call(to: u8, value: Option<u64>) -> RoutedTransaction {
    RoutedTransaction {
        kind: RoutedKind::Evm,
        to: Some(Address::repeat_byte(to)),
        data: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, to]),
        value: value.map(U256::from),
    }
}

/// Request for `amount` whole units of a zero-decimal collateral token
pub fn request(amount: &str) -> TransferRequest {
    TransferRequest::new(
        777,
        1,
        AssetRef {
            symbol: "RUNE".to_string(),
            decimals: 0,
            collateral_address: Some(collateral()),
        },
        amount,
        "bc1qrecipient0000000000000000000000000000",
        sender(),
    )
}

pub struct Harness {
    pub router: Arc<StaticRouter>,
    pub chain: Arc<FakeChain>,
    pub anchor: Arc<RecordingAnchorBuilder>,
    pub signer: Arc<RecordingSigner>,
    pub submitter: Arc<RecordingSubmitter>,
    pub settlement: Arc<FixedConfirmations>,
    pub execution: Arc<RecordingExecution>,
}

impl Harness {
    /// Collaborators that succeed; the anchor is already one block deep
    pub fn new(routed: Vec<RoutedTransaction>) -> Self {
        Self {
            router: Arc::new(StaticRouter::new(routed)),
            chain: Arc::new(FakeChain::default()),
            anchor: Arc::new(RecordingAnchorBuilder::default()),
            signer: Arc::new(RecordingSigner::default()),
            submitter: Arc::new(RecordingSubmitter::default()),
            settlement: Arc::new(FixedConfirmations::new(Some(1))),
            execution: Arc::new(RecordingExecution::default()),
        }
    }

    pub fn orchestrator(&self) -> TransferOrchestrator {
        self.orchestrator_with(ConfirmationPolicy::default())
    }

    pub fn orchestrator_with(&self, policy: ConfirmationPolicy) -> TransferOrchestrator {
        TransferOrchestrator::new(
            Collaborators {
                router: self.router.clone(),
                reader: self.chain.clone(),
                anchor_builder: self.anchor.clone(),
                signer: self.signer.clone(),
                submitter: self.submitter.clone(),
                settlement_poller: Arc::new(PollingSettlementConfirmer::new(
                    self.settlement.clone(),
                )),
                execution_poller: self.execution.clone(),
            },
            policy,
        )
    }

    pub fn submission_count(&self) -> usize {
        self.submitter.submissions.lock().unwrap().len()
    }
}
