//! Signal Source Port
//!
//! Each adapter normalizes one external source into typed [`RiskSignal`]
//! records. Fetch failures are data-quality issues, not fatal errors: the
//! aggregator keeps the previous (now aging) signal and the scorer
//! penalizes staleness.

use thiserror::Error;

use crate::domain::signal::{RiskSignal, SignalSource};

#[derive(Error, Debug, Clone)]
pub enum SignalError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unexpected payload from source: {0}")]
    Malformed(String),

    #[error("token {0} not known to this source")]
    UnknownToken(String),
}

/// One signal-type fetcher, polled by the scheduler.
#[async_trait::async_trait]
pub trait SignalFetcher: Send + Sync {
    /// Which source this adapter produces.
    fn source(&self) -> SignalSource;

    /// Fetch the current observation for one token.
    async fn fetch(&self, token_mint: &str) -> Result<RiskSignal, SignalError>;
}
