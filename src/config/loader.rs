//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::mempool::MempoolConfig;
use crate::adapters::notify::WebhookConfig;
use crate::adapters::signals::{DexScreenerConfig, RugReportConfig};
use crate::adapters::swap::JupiterConfig;
use crate::application::executor::ExecutorConfig;
use crate::application::scheduler::SchedulerConfig;
use crate::domain::settings::{ProtectionSettings, RiskThreshold, MAX_SLIPPAGE_BPS};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scheduler: SchedulerSection,
    pub protection: ProtectionSection,
    pub executor: ExecutorSection,
    pub limits: LimitsSection,
    pub signals: SignalsSection,
    pub jupiter: JupiterSection,
    pub solana: SolanaSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub mempool: MempoolSection,
    #[serde(default)]
    pub alerts: AlertsSection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// Scheduler configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Number of concurrent evaluation workers
    pub workers: usize,
    /// Cadence between full evaluation sweeps, in seconds
    pub evaluation_interval_secs: u64,
}

/// Default protection settings applied to newly enabled tokens
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionSection {
    /// Risk threshold that triggers the exit: "LOW", "MEDIUM", "HIGH", "CRITICAL"
    pub risk_threshold: String,
    /// Maximum slippage for the emergency swap, in basis points
    pub max_slippage_bps: u16,
    /// Priority fee multiplier applied to the base fee, clamped to [1.0, 5.0]
    pub priority_fee_multiplier: f64,
}

/// Exit executor configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Base retry backoff in milliseconds
    pub retry_base_ms: u64,
    /// Maximum submission attempts per intent
    pub max_attempts: u32,
    /// How long to poll for on-chain confirmation, in seconds
    pub confirm_timeout_secs: u64,
}

/// Outbound rate limit configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    /// Token bucket capacity (burst size)
    pub requests_burst: u32,
    /// Sustained requests per second across all upstreams
    pub requests_per_second: f64,
}

/// Signal source configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SignalsSection {
    /// DexScreener API base URL
    pub dexscreener_api_url: String,
    /// Rug-report API base URL
    pub rugcheck_api_url: String,
    /// Optional rug-report API key
    #[serde(default)]
    pub rugcheck_api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl SignalsSection {
    /// Get rug-report API key with environment variable fallback
    /// Checks RUGCHECK_API_KEY env var if config value is empty/None
    pub fn get_rugcheck_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.rugcheck_api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("RUGCHECK_API_KEY").ok()
    }
}

/// Jupiter API configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct JupiterSection {
    /// Jupiter swap API base URL
    pub api_url: String,
    /// Optional API key for higher rate limits (get from jup.ag)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl JupiterSection {
    /// Get API key with environment variable fallback
    /// Checks JUPITER_API_KEY env var if config value is empty/None
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("JUPITER_API_KEY").ok()
    }
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SolanaSection {
    /// RPC endpoint (use private RPC for production)
    pub rpc_url: String,
    /// Websocket endpoint for the mempool stream
    pub ws_url: String,
    /// Wallet keypair path (NEVER commit this file!)
    pub keypair_path: String,
}

impl SolanaSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }

    /// Get websocket URL with environment variable override
    /// Checks SOLANA_WS_URL env var first, falls back to config value
    pub fn get_ws_url(&self) -> String {
        std::env::var("SOLANA_WS_URL").unwrap_or_else(|_| self.ws_url.clone())
    }

    /// Get keypair path with environment variable override
    /// Checks SOLANA_KEYPAIR_PATH env var first, falls back to config value
    pub fn get_keypair_path(&self) -> String {
        std::env::var("SOLANA_KEYPAIR_PATH").unwrap_or_else(|_| self.keypair_path.clone())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

/// Mempool watcher configuration section (optional, premium)
#[derive(Debug, Clone, Deserialize)]
pub struct MempoolSection {
    /// Enable the pre-confirmation websocket stream
    #[serde(default)]
    pub enabled: bool,
    /// Delay before reconnecting after a dropped connection, in seconds
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// How often to reconcile subscriptions with the tracked set, in seconds
    #[serde(default = "default_resubscribe_interval_secs")]
    pub resubscribe_interval_secs: u64,
}

fn default_reconnect_delay_secs() -> u64 {
    2
}

fn default_resubscribe_interval_secs() -> u64 {
    30
}

impl Default for MempoolSection {
    fn default() -> Self {
        Self {
            enabled: false,
            reconnect_delay_secs: default_reconnect_delay_secs(),
            resubscribe_interval_secs: default_resubscribe_interval_secs(),
        }
    }
}

/// Alerts configuration section (optional)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertsSection {
    /// Enable webhook notifications
    #[serde(default)]
    pub webhook_enabled: bool,
    /// Webhook URL
    #[serde(default)]
    pub webhook_url: String,
}

/// Persistent protection records (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Path of the JSON protection-settings file shared by all commands
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "~/.rugshield/protection.json".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.workers == 0 {
            return Err(ConfigError::ValidationError(
                "workers must be > 0".to_string(),
            ));
        }

        if self.scheduler.evaluation_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "evaluation_interval_secs must be > 0".to_string(),
            ));
        }

        RiskThreshold::parse(&self.protection.risk_threshold)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.protection.max_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(ConfigError::ValidationError(format!(
                "max_slippage_bps must be 0-{MAX_SLIPPAGE_BPS}, got {}",
                self.protection.max_slippage_bps
            )));
        }

        if !self.protection.priority_fee_multiplier.is_finite()
            || self.protection.priority_fee_multiplier <= 0.0
        {
            return Err(ConfigError::ValidationError(format!(
                "priority_fee_multiplier must be a positive number, got {}",
                self.protection.priority_fee_multiplier
            )));
        }

        if self.executor.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be > 0".to_string(),
            ));
        }

        if self.limits.requests_burst == 0 || self.limits.requests_per_second <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "rate limits must be positive, got burst={} rate={}",
                self.limits.requests_burst, self.limits.requests_per_second
            )));
        }

        if self.signals.dexscreener_api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "dexscreener_api_url cannot be empty".to_string(),
            ));
        }

        if self.signals.rugcheck_api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rugcheck_api_url cannot be empty".to_string(),
            ));
        }

        if self.jupiter.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api_url cannot be empty".to_string(),
            ));
        }

        if self.solana.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        if self.mempool.enabled && self.solana.ws_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "ws_url cannot be empty when mempool is enabled".to_string(),
            ));
        }

        if self.solana.keypair_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "keypair_path cannot be empty".to_string(),
            ));
        }

        if self.storage.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Default protection settings for newly enabled tokens.
    ///
    /// Parses after [`validate`](Self::validate), so the threshold is known
    /// good here.
    pub fn default_protection_settings(&self) -> Result<ProtectionSettings, ConfigError> {
        let risk_threshold = RiskThreshold::parse(&self.protection.risk_threshold)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        ProtectionSettings {
            auto_sell_enabled: true,
            risk_threshold,
            mempool_monitoring: self.mempool.enabled,
            priority_fee_multiplier: self.protection.priority_fee_multiplier,
            max_slippage_bps: self.protection.max_slippage_bps,
        }
        .validated()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        SchedulerConfig {
            workers: config.scheduler.workers,
            evaluation_interval: Duration::from_secs(config.scheduler.evaluation_interval_secs),
        }
    }
}

impl From<&Config> for ExecutorConfig {
    fn from(config: &Config) -> Self {
        ExecutorConfig {
            retry_base: Duration::from_millis(config.executor.retry_base_ms),
            max_attempts: config.executor.max_attempts,
            confirm_timeout: Duration::from_secs(config.executor.confirm_timeout_secs),
            ..Default::default()
        }
    }
}

impl From<&Config> for DexScreenerConfig {
    fn from(config: &Config) -> Self {
        DexScreenerConfig {
            api_base_url: config.signals.dexscreener_api_url.clone(),
            timeout: Duration::from_secs(config.signals.timeout_secs),
        }
    }
}

impl From<&Config> for RugReportConfig {
    fn from(config: &Config) -> Self {
        RugReportConfig {
            api_base_url: config.signals.rugcheck_api_url.clone(),
            api_key: config.signals.get_rugcheck_api_key(),
            timeout: Duration::from_secs(config.signals.timeout_secs),
        }
    }
}

impl From<&Config> for JupiterConfig {
    fn from(config: &Config) -> Self {
        JupiterConfig {
            api_base_url: config.jupiter.api_url.clone(),
            api_key: config.jupiter.get_api_key(),
            timeout: Duration::from_secs(config.jupiter.timeout_secs),
        }
    }
}

impl From<&Config> for MempoolConfig {
    fn from(config: &Config) -> Self {
        MempoolConfig {
            ws_url: config.solana.get_ws_url(),
            reconnect_delay: Duration::from_secs(config.mempool.reconnect_delay_secs),
            resubscribe_interval: Duration::from_secs(config.mempool.resubscribe_interval_secs),
        }
    }
}

impl From<&Config> for WebhookConfig {
    fn from(config: &Config) -> Self {
        WebhookConfig {
            url: config.alerts.webhook_url.clone(),
            ..Default::default()
        }
    }
}
