//! Dev Wallet Fetcher
//!
//! Polls a rug-report API for dev/insider sell pressure and the result of
//! its sell simulation. A failed sell simulation is the honeypot signal the
//! scorer hard-overrides on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::adapters::signals::map_request_error;
use crate::domain::signal::{HoneypotStatus, RiskSignal, SignalSource, SignalValue};
use crate::ports::signals::{SignalError, SignalFetcher};

#[derive(Debug, Clone)]
pub struct RugReportConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for RugReportConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.rugcheck.xyz".to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RugReport {
    #[serde(default)]
    creator_sold_pct: Option<f64>,
    /// "sellable", "failed", or absent when no simulation ran
    #[serde(default)]
    sell_simulation: Option<String>,
}

pub struct DevWalletFetcher {
    config: RugReportConfig,
    http: Client,
}

impl DevWalletFetcher {
    pub fn new(config: RugReportConfig) -> Result<Self, SignalError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SignalError::Transport(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }
}

pub(crate) fn dev_wallet_signal_from_body(mint: &str, body: &str) -> Result<RiskSignal, SignalError> {
    let report: RugReport =
        serde_json::from_str(body).map_err(|e| SignalError::Malformed(e.to_string()))?;

    let honeypot = match report.sell_simulation.as_deref() {
        Some("failed") => HoneypotStatus::Confirmed,
        Some("sellable") => HoneypotStatus::Sellable,
        _ => HoneypotStatus::Unknown,
    };

    Ok(RiskSignal::new(
        mint,
        SignalValue::DevWallet {
            dev_sold_pct: report.creator_sold_pct.unwrap_or(0.0).clamp(0.0, 100.0),
            honeypot,
        },
    ))
}

#[async_trait]
impl SignalFetcher for DevWalletFetcher {
    fn source(&self) -> SignalSource {
        SignalSource::DevWallet
    }

    async fn fetch(&self, token_mint: &str) -> Result<RiskSignal, SignalError> {
        let url = format!(
            "{}/v1/tokens/{}/report",
            self.config.api_base_url, token_mint
        );
        let mut req = self.http.get(&url);
        if let Some(ref key) = self.config.api_key {
            req = req.header("x-api-key", key);
        }

        let response = req.send().await.map_err(map_request_error)?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => {
                return Err(SignalError::UnknownToken(token_mint.to_string()))
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                return Err(SignalError::RateLimited("rug report 429".to_string()))
            }
            status if !status.is_success() => {
                return Err(SignalError::Transport(format!("rug report returned {status}")))
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))?;
        dev_wallet_signal_from_body(token_mint, &body)
    }
}
