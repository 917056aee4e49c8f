//! Configuration management for the anchored transfer service
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::coordination::ConfirmationPolicy;
use crate::tx::SignatureProtocol;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "ANCHOR_TRANSFER_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub execution: ExecutionConfig,
    pub settlement: SettlementConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub instance_id: String,
    pub health_check_interval_secs: u64,
    /// How long finished transfers stay queryable
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

fn default_retention_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    /// System executor contract resolving mirrored assets
    pub executor_address: String,
    pub confirmations: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_max_attempts: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            chain_id: 777,
            rpc_urls: vec!["http://localhost:8545".to_string()],
            executor_address: "0x0000000000000000000000000000000000001000".to_string(),
            confirmations: 1,
            receipt_poll_interval_ms: 2_000,
            receipt_max_attempts: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettlementNetwork {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    pub network: SettlementNetwork,
    #[serde(default = "default_settlement_depth")]
    pub depth: u64,
    #[serde(default = "default_settlement_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_settlement_interval_ms")]
    pub interval_ms: u64,
    /// Message signing scheme of the settlement wallet
    #[serde(default = "default_signature_protocol")]
    pub signature_protocol: SignatureProtocol,
}

fn default_signature_protocol() -> SignatureProtocol {
    SignatureProtocol::Bip322
}

fn default_settlement_depth() -> u64 {
    1
}

fn default_settlement_max_attempts() -> u32 {
    60
}

fn default_settlement_interval_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Wallet gateway JSON-RPC endpoint
    pub url: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_timeout_secs() -> u64 {
    120
}

impl Settings {
    /// Load settings from the file named by `ANCHOR_TRANSFER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));
        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.execution.rpc_urls.is_empty() {
            anyhow::bail!("Execution chain has no RPC URLs configured");
        }
        if self.execution.executor_address.is_empty() {
            anyhow::bail!("Execution chain has no executor address configured");
        }
        if self.gateway.url.is_empty() {
            anyhow::bail!("Wallet gateway URL is empty");
        }
        if self.settlement.max_attempts == 0 {
            anyhow::bail!("Settlement max_attempts must be at least 1");
        }
        if self.settlement.depth == 0 || self.execution.confirmations == 0 {
            anyhow::bail!("Confirmation depths must be at least 1");
        }
        if self.metrics.enabled && self.metrics.port == self.api.port {
            anyhow::bail!("Metrics and API servers cannot share port {}", self.api.port);
        }

        Ok(())
    }

    /// Confirmation depths and polling bounds for the orchestrator
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            settlement_depth: self.settlement.depth,
            settlement_max_attempts: self.settlement.max_attempts,
            settlement_interval: Duration::from_millis(self.settlement.interval_ms),
            execution_confirmations: self.execution.confirmations,
        }
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
