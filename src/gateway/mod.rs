//! Wallet gateway client
//!
//! The gateway fronts the settlement wallet and the transfer router. It speaks
//! JSON-RPC and backs four collaborator roles: routing, anchor finalization,
//! intention signing and anchor confirmation lookups.

use crate::config::GatewayConfig;
use crate::error::{ExternalError, ExternalResult, ServiceError};
use crate::intent::Intention;
use crate::route::{RoutedTransaction, TransferRouter};
use crate::settlement::{AnchorBuilder, AnchorTransaction, SettlementStatusSource};
use crate::transfer::TransferRequest;
use crate::tx::{BatchContext, IntentionSigner, SignatureProtocol};

use async_trait::async_trait;
use ethers::providers::{Http, HttpClientError, JsonRpcClient};
use ethers::types::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

pub const ROUTE_METHOD: &str = "anchor_buildTransferRoute";
pub const FINALIZE_METHOD: &str = "anchor_finalizeBatch";
pub const CLEAR_PENDING_METHOD: &str = "anchor_clearPendingIntentions";
pub const SIGN_METHOD: &str = "anchor_signIntention";
pub const CONFIRMATIONS_METHOD: &str = "anchor_getConfirmations";

/// JSON-RPC client for the wallet gateway
#[derive(Clone)]
pub struct WalletGateway {
    client: Http,
    timeout: Duration,
}

impl WalletGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let client: Http = config.url.parse().map_err(|e| {
            ServiceError::Config(format!("invalid gateway url {}: {}", config.url, e))
        })?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn call<T, R>(&self, method: &str, params: T) -> ExternalResult<R>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        debug!("Gateway call {}", method);
        match tokio::time::timeout(self.timeout, self.client.request(method, params)).await {
            Ok(result) => result.map_err(map_client_error),
            Err(_) => Err(ExternalError::Timeout {
                operation: method.to_string(),
            }),
        }
    }
}

fn map_client_error(err: HttpClientError) -> ExternalError {
    match err {
        HttpClientError::JsonRpcError(e) if e.code == USER_REJECTED_CODE => {
            ExternalError::Rejected(e.message)
        }
        HttpClientError::JsonRpcError(e) => ExternalError::Rpc(e.message),
        HttpClientError::SerdeJson { err, .. } => ExternalError::Invalid(err.to_string()),
        other => ExternalError::Rpc(other.to_string()),
    }
}

/// EIP-1193 code for a request the user declined
const USER_REJECTED_CODE: i64 = 4001;

/// Parameters of a single signing request
pub fn sign_params(
    anchor_txid: &str,
    protocol: SignatureProtocol,
    index: usize,
    intention: &Intention,
    intentions: &[Intention],
) -> Value {
    json!({
        "anchorTxid": anchor_txid,
        "protocol": protocol,
        "index": index,
        "intention": intention,
        "intentions": intentions,
    })
}

#[async_trait]
impl TransferRouter for WalletGateway {
    async fn build_operations(
        &self,
        request: &TransferRequest,
    ) -> ExternalResult<Vec<RoutedTransaction>> {
        self.call(ROUTE_METHOD, [request]).await
    }
}

#[async_trait]
impl AnchorBuilder for WalletGateway {
    async fn finalize(&self, intentions: &[Intention]) -> ExternalResult<AnchorTransaction> {
        self.call(FINALIZE_METHOD, [json!({ "intentions": intentions })])
            .await
    }
}

#[async_trait]
impl IntentionSigner for WalletGateway {
    async fn clear_pending(&self) -> ExternalResult<()> {
        let _: Value = self
            .call(CLEAR_PENDING_METHOD, json!([]))
            .await
            .map_err(|e| {
                warn!("Failed to clear pending intentions: {}", e);
                e
            })?;
        Ok(())
    }

    async fn sign(
        &self,
        ctx: &BatchContext,
        intention: &Intention,
        intentions: &[Intention],
    ) -> ExternalResult<Bytes> {
        let params = sign_params(
            ctx.anchor_txid(),
            ctx.protocol(),
            ctx.next_index(),
            intention,
            intentions,
        );
        self.call(SIGN_METHOD, [params]).await
    }
}

#[async_trait]
impl SettlementStatusSource for WalletGateway {
    async fn confirmations(&self, txid: &str) -> ExternalResult<Option<u64>> {
        self.call(CONFIRMATIONS_METHOD, [txid]).await
    }
}
