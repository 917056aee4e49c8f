//! Anchored transfer service
//!
//! Runs transfers whose execution-chain calls are authorized by a single
//! settlement-chain anchor transaction, and exposes their progress over HTTP.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use anchor_transfer::api;
use anchor_transfer::chain::{ExecutionProvider, ReceiptConfirmer};
use anchor_transfer::config::Settings;
use anchor_transfer::coordination::{Collaborators, TransferOrchestrator};
use anchor_transfer::gateway::WalletGateway;
use anchor_transfer::metrics::{self, MetricsServer};
use anchor_transfer::settlement::PollingSettlementConfirmer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting anchor-transfer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for instance {} (execution chain {}, {:?} settlement)",
        settings.service.instance_id, settings.execution.chain_id, settings.settlement.network
    );

    // Execution chain adapters
    let execution = Arc::new(ExecutionProvider::new(settings.execution.clone())?);
    let receipts = ReceiptConfirmer::new(
        execution.clone(),
        Duration::from_millis(settings.execution.receipt_poll_interval_ms),
        settings.execution.receipt_max_attempts,
    );
    info!("Execution chain {} provider initialized", execution.chain_id());

    // Wallet gateway adapters
    let gateway = Arc::new(WalletGateway::new(&settings.gateway)?);
    let settlement = PollingSettlementConfirmer::new(gateway.clone());
    info!("Wallet gateway client initialized for {}", settings.gateway.url);

    let orchestrator = Arc::new(TransferOrchestrator::new(
        Collaborators {
            router: gateway.clone(),
            reader: execution.clone(),
            anchor_builder: gateway.clone(),
            signer: gateway.clone(),
            submitter: execution.clone(),
            settlement_poller: Arc::new(settlement),
            execution_poller: Arc::new(receipts),
        },
        settings.confirmation_policy(),
    )
    .with_signature_protocol(settings.settlement.signature_protocol));
    info!("Transfer orchestrator initialized");

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let orchestrator = orchestrator.clone();
        async move {
            if let Err(e) = api::run_server(config, orchestrator).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health check and retention loop
    let health_handle = tokio::spawn({
        let execution = execution.clone();
        let orchestrator = orchestrator.clone();
        let interval = settings.service.health_check_interval_secs;
        let retention = chrono::Duration::seconds(settings.service.retention_secs as i64);
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;

                let healthy = execution.health_check().await;
                metrics::record_chain_health(execution.chain_id(), healthy);
                if healthy {
                    metrics::record_health_check();
                } else {
                    warn!("Execution chain {} health check failed", execution.chain_id());
                    metrics::record_health_check_failure();
                }

                let pruned = orchestrator.prune_finished(chrono::Utc::now() - retention);
                if pruned > 0 {
                    info!("Pruned {} finished transfers", pruned);
                }
            }
        }
    });

    info!("anchor-transfer is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    let stats = orchestrator.ledger().stats();
    info!(
        "anchor-transfer stopped ({} confirmed, {} failed, {} unconfirmed, {} awaiting confirmation)",
        stats.confirmed, stats.failed, stats.confirmation_failed, stats.broadcast
    );
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,anchor_transfer=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
