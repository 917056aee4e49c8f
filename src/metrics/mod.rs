//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transfer outcomes
//! - Stage latency
//! - Signing and deposit sizing
//! - Service health

use crate::error::ServiceError;
use crate::intent::AssetId;
use crate::progress::TransferStage;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Transfer metrics
    pub static ref TRANSFERS_STARTED: CounterVec = register_counter_vec!(
        "anchor_transfer_transfers_started_total",
        "Total transfers started",
        &[]
    ).unwrap();

    pub static ref TRANSFERS_SUCCEEDED: CounterVec = register_counter_vec!(
        "anchor_transfer_transfers_succeeded_total",
        "Total transfers confirmed on both chains",
        &[]
    ).unwrap();

    pub static ref TRANSFERS_FAILED: CounterVec = register_counter_vec!(
        "anchor_transfer_transfers_failed_total",
        "Total failed transfers by failing stage",
        &["stage"]
    ).unwrap();

    pub static ref STAGE_LATENCY: HistogramVec = register_histogram_vec!(
        "anchor_transfer_stage_latency_seconds",
        "Time spent in each transfer stage",
        &["stage"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0]
    ).unwrap();

    // Signing and deposit metrics
    pub static ref INTENTIONS_SIGNED: CounterVec = register_counter_vec!(
        "anchor_transfer_intentions_signed_total",
        "Total intentions signed by the settlement wallet",
        &[]
    ).unwrap();

    pub static ref DEPOSIT_DEFICITS: CounterVec = register_counter_vec!(
        "anchor_transfer_deposit_deficits_total",
        "Total transfers that required a mirrored asset deposit",
        &["asset_id"]
    ).unwrap();

    // Chain metrics
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "anchor_transfer_chain_connected",
        "Chain connection status (1=connected, 0=disconnected)",
        &["chain_id"]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "anchor_transfer_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: CounterVec = register_counter_vec!(
        "anchor_transfer_health_check_failure_total",
        "Total failed health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> Result<(), ServiceError> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServiceError::Internal(format!("metrics bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_transfer_started() {
    TRANSFERS_STARTED.with_label_values(&[]).inc();
}

pub fn record_transfer_succeeded() {
    TRANSFERS_SUCCEEDED.with_label_values(&[]).inc();
}

pub fn record_transfer_failed(stage: TransferStage) {
    TRANSFERS_FAILED
        .with_label_values(&[stage.as_str()])
        .inc();
}

pub fn record_stage_latency(stage: TransferStage, latency_secs: f64) {
    STAGE_LATENCY
        .with_label_values(&[stage.as_str()])
        .observe(latency_secs);
}

pub fn record_intention_signed() {
    INTENTIONS_SIGNED.with_label_values(&[]).inc();
}

pub fn record_deposit_deficit(asset_id: &AssetId) {
    DEPOSIT_DEFICITS
        .with_label_values(&[&asset_id.0])
        .inc();
}

pub fn record_chain_health(chain_id: u64, healthy: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[&chain_id.to_string()])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}

pub fn record_health_check_failure() {
    HEALTH_CHECK_FAILURE.with_label_values(&[]).inc();
}
