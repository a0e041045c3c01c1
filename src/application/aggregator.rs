//! Risk Signal Aggregator
//!
//! In-memory store of the latest signal per (token, source). Push from
//! adapters and the mempool watcher, pull from the evaluation cycle.
//! Signals past their freshness window are marked stale at snapshot time,
//! not discarded, so the scorer can penalize staleness instead of guessing.
//! No decision is made here.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::signal::{RiskSignal, SignalSource};
use crate::domain::snapshot::RiskSnapshot;

/// Latest-signal store, bounded per token by the number of source types.
#[derive(Default)]
pub struct SignalAggregator {
    latest: RwLock<HashMap<String, HashMap<SignalSource, RiskSignal>>>,
}

impl SignalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one signal, superseding any older signal of the same type.
    /// Out-of-order delivery is tolerated: an older observation never
    /// replaces a newer one.
    pub async fn ingest(&self, signal: RiskSignal) {
        let mut latest = self.latest.write().await;
        let per_token = latest.entry(signal.token_mint.clone()).or_default();

        match per_token.get(&signal.source()) {
            Some(existing) if existing.observed_at > signal.observed_at => {
                tracing::trace!(
                    mint = %signal.token_mint,
                    source = ?signal.source(),
                    "dropping out-of-order signal"
                );
            }
            _ => {
                per_token.insert(signal.source(), signal);
            }
        }
    }

    /// Current snapshot for a token. Missing sources come back as explicit
    /// unknowns; aged signals come back marked stale.
    pub async fn snapshot(&self, token_mint: &str) -> RiskSnapshot {
        let now = Utc::now();
        let latest = self.latest.read().await;
        match latest.get(token_mint) {
            Some(per_token) => {
                RiskSnapshot::from_latest(token_mint, now, per_token.values().cloned())
            }
            None => RiskSnapshot::empty(token_mint, now),
        }
    }

    /// Drop all stored signals for a token (called on protection removal).
    pub async fn forget(&self, token_mint: &str) {
        self.latest.write().await.remove(token_mint);
    }

    /// Number of tokens with at least one stored signal.
    pub async fn tracked_tokens(&self) -> usize {
        self.latest.read().await.len()
    }
}
