//! Signal Source Adapters
//!
//! One fetcher per source type, each normalizing an external API into
//! [`crate::domain::signal::RiskSignal`] records. Parsing is kept in pure
//! functions so it stays testable without a network.

mod dev_wallet;
mod holders;
mod liquidity;
mod price;

pub use dev_wallet::{DevWalletFetcher, RugReportConfig};
pub use holders::HolderFetcher;
pub use liquidity::{DexScreenerConfig, LiquidityFetcher};
pub use price::PriceFetcher;

use crate::ports::signals::SignalError;

/// Shared reqwest error mapping for the HTTP fetchers.
pub(crate) fn map_request_error(e: reqwest::Error) -> SignalError {
    if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
        SignalError::RateLimited(e.to_string())
    } else {
        SignalError::Transport(e.to_string())
    }
}
