//! Swap Routing Port
//!
//! Contract the exit engine requires from the external swap-routing
//! collaborator: quote a route, submit it, and look up submission status.
//! The error taxonomy distinguishes transient infrastructure failures
//! (retryable, no funds moved) from terminal execution failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SwapError {
    #[error("RPC/API request failed: {0}")]
    Transport(String),

    #[error("rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("no route available for {0}")]
    RouteUnavailable(String),

    #[error("slippage tolerance exceeded")]
    SlippageExceeded,

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl SwapError {
    /// Transient errors are safe to retry because no funds have moved.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwapError::Transport(_) | SwapError::RateLimited(_) | SwapError::Timeout(_)
        )
    }
}

/// A quoted exit route (token -> SOL) bounded by the caller's slippage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Minimum output after the slippage bound
    pub min_out_amount: u64,
    pub slippage_bps: u16,
    /// Base network fee estimate in lamports, before the priority multiplier
    pub base_fee_lamports: u64,
    /// Opaque payload the router needs back at submit time
    pub payload: serde_json::Value,
}

/// On-chain status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// External swap-routing collaborator.
#[async_trait::async_trait]
pub trait SwapRoutingPort: Send + Sync {
    /// Quote an exit route for `amount` of `token_mint` into SOL, bounded
    /// by `max_slippage_bps`.
    async fn quote(
        &self,
        token_mint: &str,
        amount: u64,
        max_slippage_bps: u16,
    ) -> Result<Route, SwapError>;

    /// Submit a quoted route with the given priority fee. Returns the
    /// transaction signature on acceptance.
    async fn submit(&self, route: &Route, priority_fee_lamports: u64)
        -> Result<String, SwapError>;

    /// Look up the status of a previously submitted transaction. Used both
    /// for confirmation polling and for post-timeout reconciliation.
    async fn status(&self, signature: &str) -> Result<TxStatus, SwapError>;
}
