//! Liquidity Fetcher
//!
//! Polls DexScreener for pool liquidity and its hourly/daily deltas. When a
//! token trades in several pools, the deepest pool represents it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::adapters::signals::map_request_error;
use crate::domain::signal::{RiskSignal, SignalSource, SignalValue};
use crate::ports::signals::{SignalError, SignalFetcher};

#[derive(Debug, Clone)]
pub struct DexScreenerConfig {
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for DexScreenerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.dexscreener.com".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    liquidity: Option<PairLiquidity>,
    #[serde(default)]
    price_change: Option<PriceChange>,
    #[serde(default)]
    price_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairLiquidity {
    #[serde(default)]
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    #[serde(default)]
    h1: Option<f64>,
    #[serde(default)]
    h24: Option<f64>,
}

pub struct LiquidityFetcher {
    config: DexScreenerConfig,
    http: Client,
}

impl LiquidityFetcher {
    pub fn new(config: DexScreenerConfig) -> Result<Self, SignalError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SignalError::Transport(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }
}

/// Deepest pool wins when a token trades in several.
fn deepest_pair(pairs: Vec<Pair>) -> Option<Pair> {
    pairs.into_iter().max_by(|a, b| {
        let la = a.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
        let lb = b.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
        la.total_cmp(&lb)
    })
}

pub(crate) fn liquidity_signal_from_body(mint: &str, body: &str) -> Result<RiskSignal, SignalError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| SignalError::Malformed(e.to_string()))?;
    let pair = response
        .pairs
        .filter(|p| !p.is_empty())
        .and_then(deepest_pair)
        .ok_or_else(|| SignalError::UnknownToken(mint.to_string()))?;

    Ok(RiskSignal::new(
        mint,
        SignalValue::Liquidity {
            liquidity_usd: pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0),
            change_1h_pct: pair.price_change.as_ref().and_then(|c| c.h1).unwrap_or(0.0),
            change_24h_pct: pair.price_change.as_ref().and_then(|c| c.h24).unwrap_or(0.0),
            // DexScreener does not report lock status
            lp_locked_pct: None,
        },
    ))
}

/// Same upstream document, read for price instead of depth.
pub(crate) fn price_signal_from_body(mint: &str, body: &str) -> Result<RiskSignal, SignalError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| SignalError::Malformed(e.to_string()))?;
    let pair = response
        .pairs
        .filter(|p| !p.is_empty())
        .and_then(deepest_pair)
        .ok_or_else(|| SignalError::UnknownToken(mint.to_string()))?;

    let price_usd = pair
        .price_usd
        .as_deref()
        .and_then(|raw| raw.parse::<f64>().ok())
        .ok_or_else(|| SignalError::Malformed(format!("no priceUsd for {mint}")))?;

    Ok(RiskSignal::new(
        mint,
        SignalValue::Price {
            price_usd,
            change_24h_pct: pair.price_change.as_ref().and_then(|c| c.h24).unwrap_or(0.0),
        },
    ))
}

impl LiquidityFetcher {
    pub(crate) async fn fetch_body(&self, token_mint: &str) -> Result<String, SignalError> {
        let url = format!(
            "{}/latest/dex/tokens/{}",
            self.config.api_base_url, token_mint
        );
        let response = self.http.get(&url).send().await.map_err(map_request_error)?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SignalError::RateLimited("dexscreener 429".to_string()));
        }
        if !response.status().is_success() {
            return Err(SignalError::Transport(format!(
                "dexscreener returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))
    }
}

#[async_trait]
impl SignalFetcher for LiquidityFetcher {
    fn source(&self) -> SignalSource {
        SignalSource::Liquidity
    }

    async fn fetch(&self, token_mint: &str) -> Result<RiskSignal, SignalError> {
        let body = self.fetch_body(token_mint).await?;
        liquidity_signal_from_body(token_mint, &body)
    }
}
