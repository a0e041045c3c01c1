//! Price Fetcher
//!
//! Reads the same DexScreener document as the liquidity fetcher but reports
//! the price view of it. Kept as a separate source so price staleness and
//! liquidity staleness degrade independently.

use async_trait::async_trait;

use crate::adapters::signals::liquidity::{price_signal_from_body, LiquidityFetcher};
use crate::adapters::signals::DexScreenerConfig;
use crate::domain::signal::{RiskSignal, SignalSource};
use crate::ports::signals::{SignalError, SignalFetcher};

pub struct PriceFetcher {
    inner: LiquidityFetcher,
}

impl PriceFetcher {
    pub fn new(config: DexScreenerConfig) -> Result<Self, SignalError> {
        Ok(Self {
            inner: LiquidityFetcher::new(config)?,
        })
    }
}

#[async_trait]
impl SignalFetcher for PriceFetcher {
    fn source(&self) -> SignalSource {
        SignalSource::Price
    }

    async fn fetch(&self, token_mint: &str) -> Result<RiskSignal, SignalError> {
        let body = self.inner.fetch_body(token_mint).await?;
        price_signal_from_body(token_mint, &body)
    }
}
