//! Execution chain provider with multi-RPC support and automatic failover

use crate::chain::ChainReader;
use crate::config::ExecutionConfig;
use crate::error::{ExternalError, ExternalResult, ServiceError};
use crate::intent::AssetId;
use crate::tx::BatchSubmitter;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

abigen!(
    Erc20,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
    ]"#
);

abigen!(
    Executor,
    r#"[
        function getRuneIdByAssetAddress(address asset) external view returns (bytes32, uint256)
    ]"#
);

/// RPC method accepting a signed execution batch together with its anchor
pub const SEND_BATCH_METHOD: &str = "eth_sendBTCTransactions";

/// Multi-provider wrapper with automatic failover
pub struct ExecutionProvider {
    /// Execution chain configuration
    config: ExecutionConfig,
    /// System executor contract
    executor: Address,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Arc<Provider<Http>>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ExecutionProvider {
    pub fn new(config: ExecutionConfig) -> Result<Self, ServiceError> {
        let executor: Address = config.executor_address.parse().map_err(|_| {
            ServiceError::Config(format!(
                "invalid executor address {}",
                config.executor_address
            ))
        })?;

        let mut http_providers = Vec::new();
        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(Arc::new(provider));
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(ServiceError::ChainConnection {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            config,
            executor,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> Arc<Provider<Http>> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        self.http_providers[idx % self.http_providers.len()].clone()
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Get current block number with failover
    pub async fn get_block_number(&self) -> ExternalResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_block_number().await {
                Ok(block) => return Ok(block.as_u64()),
                Err(e) => {
                    warn!(
                        "Failed to get block number from chain {}: {}",
                        self.config.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(ExternalError::Rpc(format!(
            "all providers failed for chain {}",
            self.config.chain_id
        )))
    }

    /// Get transaction receipt
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> ExternalResult<Option<TransactionReceipt>> {
        self.http()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ExternalError::Rpc(e.to_string()))
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for chain {}: {}", self.config.chain_id, e);
                false
            }
        }
    }
}

#[async_trait]
impl ChainReader for ExecutionProvider {
    async fn read_asset(&self, asset: Address) -> ExternalResult<Option<AssetId>> {
        let executor = Executor::new(self.executor, self.http());
        let (raw, _) = executor
            .get_rune_id_by_asset_address(asset)
            .call()
            .await
            .map_err(|e| ExternalError::Rpc(e.to_string()))?;
        Ok(decode_rune_id(raw))
    }

    async fn read_balance(&self, asset: Address, owner: Address) -> ExternalResult<U256> {
        Erc20::new(asset, self.http())
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| ExternalError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl BatchSubmitter for ExecutionProvider {
    async fn submit(&self, signed_txs: &[Bytes], anchor_raw: &Bytes) -> ExternalResult<()> {
        let params = (signed_txs.to_vec(), anchor_raw.clone());
        let _: serde_json::Value = self
            .http()
            .request(SEND_BATCH_METHOD, params)
            .await
            .map_err(|e| ExternalError::Rpc(e.to_string()))?;
        debug!(
            "Submitted {} execution transactions on chain {}",
            signed_txs.len(),
            self.config.chain_id
        );
        Ok(())
    }
}

/// Decode the executor's packed settlement asset id: block height in bytes
/// 20..28 and transaction index in bytes 28..32, both big-endian. An all-zero
/// word means the asset is not mirrored.
pub fn decode_rune_id(raw: [u8; 32]) -> Option<AssetId> {
    if raw.iter().all(|b| *b == 0) {
        return None;
    }
    let mut block = [0u8; 8];
    block.copy_from_slice(&raw[20..28]);
    let mut tx = [0u8; 4];
    tx.copy_from_slice(&raw[28..32]);
    Some(AssetId(format!(
        "{}:{}",
        u64::from_be_bytes(block),
        u32::from_be_bytes(tx)
    )))
}
