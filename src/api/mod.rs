//! HTTP API for starting transfers and observing their progress

use crate::config::ApiConfig;
use crate::coordination::TransferOrchestrator;
use crate::error::ServiceError;
use crate::progress::ProgressSnapshot;
use crate::state::{TransferRecord, TransferStats};
use crate::transfer::{AssetRef, TransferRequest};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
}

/// Build the API router
pub fn router(orchestrator: Arc<TransferOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/transfers", get(list_transfers).post(start_transfer))
        .route("/transfers/:id", get(get_transfer))
        .route("/transfers/:id/reset", post(reset_transfer))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState { orchestrator })
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    orchestrator: Arc<TransferOrchestrator>,
) -> Result<(), ServiceError> {
    let app = router(orchestrator);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::Internal(format!("API bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get transfer statistics
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        transfers: state.orchestrator.ledger().stats(),
        tracked: state.orchestrator.progress().len(),
    })
}

async fn list_transfers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.ledger().list())
}

/// Start a transfer in the background
async fn start_transfer(
    State(state): State<AppState>,
    Json(body): Json<StartTransferRequest>,
) -> impl IntoResponse {
    let request = TransferRequest::new(
        body.origin_chain,
        body.destination_chain,
        body.asset,
        body.amount,
        body.recipient,
        body.sender,
    );
    let id = request.id;
    // Register progress before responding so the id is immediately observable
    state.orchestrator.progress().tracker(id);

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(failure) = orchestrator.execute(&request).await {
            debug!("Transfer {} ended with: {}", request.id, failure.user_message());
        }
    });

    (StatusCode::ACCEPTED, Json(StartTransferResponse { id }))
}

async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransferResponse>, StatusCode> {
    let progress = state
        .orchestrator
        .progress()
        .snapshot(&id)
        .ok_or(StatusCode::NOT_FOUND)?;
    let record = state.orchestrator.ledger().get(&id);

    Ok(Json(TransferResponse {
        id,
        record,
        progress,
    }))
}

async fn reset_transfer(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.orchestrator.progress().reset(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// Request and response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransferRequest {
    pub origin_chain: u64,
    pub destination_chain: u64,
    pub asset: AssetRef,
    pub amount: String,
    pub recipient: String,
    pub sender: Address,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct StatsResponse {
    transfers: TransferStats,
    tracked: usize,
}

#[derive(Serialize)]
struct StartTransferResponse {
    id: Uuid,
}

#[derive(Serialize)]
struct TransferResponse {
    id: Uuid,
    /// Absent while the transfer is registered but not yet started
    record: Option<TransferRecord>,
    progress: ProgressSnapshot,
}
