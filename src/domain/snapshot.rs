//! Risk Snapshots
//!
//! The latest known reading per signal source for one token at evaluation
//! time. A source that never reported is an explicit `Unknown`, never a
//! silent zero - the scorer treats missing data as uncertainty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::signal::{RiskSignal, SignalSource};

/// One source's reading inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reading {
    /// Signal within its freshness window
    Fresh(RiskSignal),
    /// Signal exists but is older than its freshness window
    Stale(RiskSignal),
    /// No signal ever received from this source
    Unknown,
}

impl Reading {
    pub fn signal(&self) -> Option<&RiskSignal> {
        match self {
            Reading::Fresh(s) | Reading::Stale(s) => Some(s),
            Reading::Unknown => None,
        }
    }

    /// True when the reading cannot be fully trusted (stale or missing).
    pub fn is_uncertain(&self) -> bool {
        !matches!(self, Reading::Fresh(_))
    }
}

/// Point-in-time view of everything known about one token.
///
/// Derived from the aggregator's store; cached at most for one evaluation
/// cycle, never persisted long-term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub token_mint: String,
    pub taken_at: DateTime<Utc>,
    readings: HashMap<SignalSource, Reading>,
}

impl RiskSnapshot {
    /// Build a snapshot from the latest signal per source, marking each as
    /// fresh or stale against `taken_at`. Sources absent from `latest` are
    /// recorded as `Unknown`.
    pub fn from_latest(
        token_mint: impl Into<String>,
        taken_at: DateTime<Utc>,
        latest: impl IntoIterator<Item = RiskSignal>,
    ) -> Self {
        let mut readings: HashMap<SignalSource, Reading> = SignalSource::POLLED
            .iter()
            .map(|s| (*s, Reading::Unknown))
            .collect();

        for signal in latest {
            let reading = if signal.is_fresh_at(taken_at) {
                Reading::Fresh(signal.clone())
            } else {
                Reading::Stale(signal.clone())
            };
            readings.insert(signal.source(), reading);
        }

        Self {
            token_mint: token_mint.into(),
            taken_at,
            readings,
        }
    }

    /// Snapshot with every polled source unknown.
    pub fn empty(token_mint: impl Into<String>, taken_at: DateTime<Utc>) -> Self {
        Self::from_latest(token_mint, taken_at, std::iter::empty())
    }

    pub fn reading(&self, source: SignalSource) -> &Reading {
        self.readings.get(&source).unwrap_or(&Reading::Unknown)
    }

    /// True when no polled source has a fresh reading.
    pub fn all_uncertain(&self) -> bool {
        SignalSource::POLLED
            .iter()
            .all(|s| self.reading(*s).is_uncertain())
    }

    /// Number of sources with any reading at all.
    pub fn known_sources(&self) -> usize {
        self.readings
            .values()
            .filter(|r| r.signal().is_some())
            .count()
    }
}
