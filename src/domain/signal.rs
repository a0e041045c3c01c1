//! Risk Signals
//!
//! One observation from one source adapter. Signals are immutable once
//! created; a newer signal of the same type supersedes the old one in the
//! aggregator, it never mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Freshness window for slow HTTP/RPC sources
pub const SLOW_SOURCE_FRESHNESS: Duration = Duration::from_secs(300);

/// Freshness window for the pre-confirmation mempool stream
pub const MEMPOOL_FRESHNESS: Duration = Duration::from_secs(2);

/// Which external source produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Liquidity,
    Price,
    HolderDistribution,
    DevWallet,
    MempoolAnomaly,
}

impl SignalSource {
    /// All polled sources, in evaluation order. The mempool stream pushes
    /// asynchronously and is not polled.
    pub const POLLED: [SignalSource; 4] = [
        SignalSource::Liquidity,
        SignalSource::Price,
        SignalSource::HolderDistribution,
        SignalSource::DevWallet,
    ];

    /// How old a signal of this type may be before it is marked stale.
    pub fn freshness_window(&self) -> Duration {
        match self {
            SignalSource::MempoolAnomaly => MEMPOOL_FRESHNESS,
            _ => SLOW_SOURCE_FRESHNESS,
        }
    }
}

/// Result of a sell-simulation / honeypot check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoneypotStatus {
    /// No check performed yet
    Unknown,
    /// Sell simulation succeeded
    Sellable,
    /// Sell simulation failed - token cannot be sold
    Confirmed,
}

/// Kind of anomaly spotted in the pending-transaction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Pending transaction removes a large share of pool liquidity
    LiquidityRemoval,
    /// Pending transaction moves a large share of the dev wallet
    DevWalletTransfer,
}

/// Source-specific observation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalValue {
    Liquidity {
        liquidity_usd: f64,
        change_1h_pct: f64,
        change_24h_pct: f64,
        lp_locked_pct: Option<f64>,
    },
    Price {
        price_usd: f64,
        change_24h_pct: f64,
    },
    Holders {
        holder_count: u64,
        top_holder_pct: f64,
        creator_pct: f64,
    },
    DevWallet {
        dev_sold_pct: f64,
        honeypot: HoneypotStatus,
    },
    MempoolAnomaly {
        kind: AnomalyKind,
        estimated_impact_pct: f64,
        pending_signature: Option<String>,
    },
}

impl SignalValue {
    /// The source type this payload belongs to.
    pub fn source(&self) -> SignalSource {
        match self {
            SignalValue::Liquidity { .. } => SignalSource::Liquidity,
            SignalValue::Price { .. } => SignalSource::Price,
            SignalValue::Holders { .. } => SignalSource::HolderDistribution,
            SignalValue::DevWallet { .. } => SignalSource::DevWallet,
            SignalValue::MempoolAnomaly { .. } => SignalSource::MempoolAnomaly,
        }
    }
}

/// A single immutable observation from one adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub token_mint: String,
    pub observed_at: DateTime<Utc>,
    pub value: SignalValue,
}

impl RiskSignal {
    pub fn new(token_mint: impl Into<String>, value: SignalValue) -> Self {
        Self {
            token_mint: token_mint.into(),
            observed_at: Utc::now(),
            value,
        }
    }

    pub fn observed_at(
        token_mint: impl Into<String>,
        value: SignalValue,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_mint: token_mint.into(),
            observed_at: at,
            value,
        }
    }

    pub fn source(&self) -> SignalSource {
        self.value.source()
    }

    /// Whether this signal is still within its freshness window at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.observed_at);
        match age.to_std() {
            Ok(age) => age <= self.source().freshness_window(),
            // Observed "in the future" (clock skew) counts as fresh
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn liquidity_value() -> SignalValue {
        SignalValue::Liquidity {
            liquidity_usd: 50_000.0,
            change_1h_pct: -2.0,
            change_24h_pct: 5.0,
            lp_locked_pct: Some(90.0),
        }
    }

    #[test]
    fn test_value_source_mapping() {
        assert_eq!(liquidity_value().source(), SignalSource::Liquidity);
        assert_eq!(
            SignalValue::MempoolAnomaly {
                kind: AnomalyKind::LiquidityRemoval,
                estimated_impact_pct: 80.0,
                pending_signature: None,
            }
            .source(),
            SignalSource::MempoolAnomaly
        );
    }

    #[test]
    fn test_freshness_windows() {
        assert_eq!(
            SignalSource::Liquidity.freshness_window(),
            SLOW_SOURCE_FRESHNESS
        );
        assert_eq!(
            SignalSource::MempoolAnomaly.freshness_window(),
            MEMPOOL_FRESHNESS
        );
    }

    #[test]
    fn test_fresh_signal() {
        let signal = RiskSignal::new("Mint111", liquidity_value());
        assert!(signal.is_fresh_at(Utc::now()));
    }

    #[test]
    fn test_stale_slow_signal() {
        let old = Utc::now() - ChronoDuration::seconds(301);
        let signal = RiskSignal::observed_at("Mint111", liquidity_value(), old);
        assert!(!signal.is_fresh_at(Utc::now()));
    }

    #[test]
    fn test_mempool_signal_goes_stale_fast() {
        let old = Utc::now() - ChronoDuration::seconds(3);
        let signal = RiskSignal::observed_at(
            "Mint111",
            SignalValue::MempoolAnomaly {
                kind: AnomalyKind::DevWalletTransfer,
                estimated_impact_pct: 50.0,
                pending_signature: Some("sig".to_string()),
            },
            old,
        );
        assert!(!signal.is_fresh_at(Utc::now()));
    }

    #[test]
    fn test_future_observation_counts_as_fresh() {
        let future = Utc::now() + ChronoDuration::seconds(5);
        let signal = RiskSignal::observed_at("Mint111", liquidity_value(), future);
        assert!(signal.is_fresh_at(Utc::now()));
    }

    #[test]
    fn test_signal_serialization_roundtrip() {
        let signal = RiskSignal::new("Mint111", liquidity_value());
        let json = serde_json::to_string(&signal).unwrap();
        let back: RiskSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signal);
    }
}
