//! Recording collaborators for end-to-end transfer tests

use anchor_transfer::chain::{ChainReader, ExecutionConfirmationPoller, ExecutionReceipt};
use anchor_transfer::error::{ExternalError, ExternalResult};
use anchor_transfer::intent::{AssetId, Intention};
use anchor_transfer::route::{RoutedTransaction, TransferRouter};
use anchor_transfer::settlement::{AnchorBuilder, AnchorTransaction, SettlementStatusSource};
use anchor_transfer::transfer::TransferRequest;
use anchor_transfer::tx::{BatchContext, BatchSubmitter, IntentionSigner};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const ANCHOR_TXID: &str = "5f1e6b4c0a9d3e2f1b8c7a6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b9c8d7e6f";

/// Txid the recording anchor builder assigns to its `n`th batch
pub fn anchor_txid(n: usize) -> String {
    match n {
        0 => ANCHOR_TXID.to_string(),
        n => format!("{:064x}", n),
    }
}

/// Bytes the recording signer returns for intention `index`
pub fn signed_bytes(anchor_txid: &str, index: usize) -> Bytes {
    Bytes::from(format!("signed:{}:{}", anchor_txid, index).into_bytes())
}

pub struct StaticRouter {
    routed: Mutex<ExternalResult<Vec<RoutedTransaction>>>,
    pub calls: AtomicUsize,
}

impl StaticRouter {
    pub fn new(routed: Vec<RoutedTransaction>) -> Self {
        Self {
            routed: Mutex::new(Ok(routed)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, err: ExternalError) {
        *self.routed.lock().unwrap() = Err(err);
    }
}

#[async_trait]
impl TransferRouter for StaticRouter {
    async fn build_operations(
        &self,
        _request: &TransferRequest,
    ) -> ExternalResult<Vec<RoutedTransaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.routed.lock().unwrap().clone()
    }
}

/// Execution chain state: mirrored assets and token balances
#[derive(Default)]
pub struct FakeChain {
    assets: Mutex<HashMap<Address, AssetId>>,
    balances: Mutex<HashMap<(Address, Address), U256>>,
}

impl FakeChain {
    pub fn mirror(&self, asset: Address, id: &str) {
        self.assets.lock().unwrap().insert(asset, AssetId(id.to_string()));
    }

    pub fn set_balance(&self, asset: Address, owner: Address, balance: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert((asset, owner), U256::from(balance));
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn read_asset(&self, asset: Address) -> ExternalResult<Option<AssetId>> {
        Ok(self.assets.lock().unwrap().get(&asset).cloned())
    }

    async fn read_balance(&self, asset: Address, owner: Address) -> ExternalResult<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(asset, owner))
            .copied()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingAnchorBuilder {
    pub batches: Mutex<Vec<Vec<Intention>>>,
}

#[async_trait]
impl AnchorBuilder for RecordingAnchorBuilder {
    async fn finalize(&self, intentions: &[Intention]) -> ExternalResult<AnchorTransaction> {
        let mut batches = self.batches.lock().unwrap();
        let txid = anchor_txid(batches.len());
        batches.push(intentions.to_vec());
        Ok(AnchorTransaction {
            txid,
            raw: Bytes::from(vec![0x02, 0x00, 0x00, 0x00]),
        })
    }
}

/// Signs every intention unless told to reject a given index
#[derive(Default)]
pub struct RecordingSigner {
    reject_at: Mutex<Option<usize>>,
    clear_error: Mutex<Option<ExternalError>>,
    pub cleared: AtomicUsize,
    /// (index signed, signatures already in the batch context)
    pub requests: Mutex<Vec<(usize, usize)>>,
    /// Same as `requests`, keyed by the anchor being signed against
    pub by_anchor: Mutex<HashMap<String, Vec<(usize, usize)>>>,
}

impl RecordingSigner {
    pub fn reject_at(&self, index: usize) {
        *self.reject_at.lock().unwrap() = Some(index);
    }

    pub fn fail_clear(&self, err: ExternalError) {
        *self.clear_error.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl IntentionSigner for RecordingSigner {
    async fn clear_pending(&self) -> ExternalResult<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        match self.clear_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn sign(
        &self,
        ctx: &BatchContext,
        _intention: &Intention,
        _intentions: &[Intention],
    ) -> ExternalResult<Bytes> {
        let index = ctx.next_index();
        self.requests.lock().unwrap().push((index, ctx.signed().len()));
        self.by_anchor
            .lock()
            .unwrap()
            .entry(ctx.anchor_txid().to_string())
            .or_default()
            .push((index, ctx.signed().len()));
        tokio::task::yield_now().await;
        if *self.reject_at.lock().unwrap() == Some(index) {
            return Err(ExternalError::Rejected("user rejected the request".to_string()));
        }
        Ok(signed_bytes(ctx.anchor_txid(), index))
    }
}

#[derive(Default)]
pub struct RecordingSubmitter {
    pub submissions: Mutex<Vec<(Vec<Bytes>, Bytes)>>,
}

#[async_trait]
impl BatchSubmitter for RecordingSubmitter {
    async fn submit(&self, signed_txs: &[Bytes], anchor_raw: &Bytes) -> ExternalResult<()> {
        self.submissions
            .lock()
            .unwrap()
            .push((signed_txs.to_vec(), anchor_raw.clone()));
        Ok(())
    }
}

/// Settlement node reporting a fixed confirmation count
pub struct FixedConfirmations {
    confirmations: Mutex<Option<u64>>,
    pub polls: AtomicUsize,
}

impl FixedConfirmations {
    pub fn new(confirmations: Option<u64>) -> Self {
        Self {
            confirmations: Mutex::new(confirmations),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, confirmations: Option<u64>) {
        *self.confirmations.lock().unwrap() = confirmations;
    }
}

#[async_trait]
impl SettlementStatusSource for FixedConfirmations {
    async fn confirmations(&self, _txid: &str) -> ExternalResult<Option<u64>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.confirmations.lock().unwrap())
    }
}

/// Confirms every execution transaction immediately
#[derive(Default)]
pub struct RecordingExecution {
    pub awaited: Mutex<Vec<H256>>,
}

#[async_trait]
impl ExecutionConfirmationPoller for RecordingExecution {
    async fn await_confirmation(
        &self,
        tx_hash: H256,
        _confirmations: u64,
    ) -> ExternalResult<ExecutionReceipt> {
        self.awaited.lock().unwrap().push(tx_hash);
        Ok(ExecutionReceipt {
            tx_hash,
            block_number: 42,
            success: true,
        })
    }
}
