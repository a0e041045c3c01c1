//! Protected Tokens
//!
//! One [`ProtectedToken`] exists per (wallet, mint) pair and owns the
//! protection state machine. Transitions are validated here; the engine in
//! `application::monitor` enforces single-writer access per token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::scorer::{RiskLevel, ScoreBreakdown};
use crate::domain::settings::ProtectionSettings;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ProtectionState,
        to: ProtectionState,
    },

    #[error("protection failed permanently: {0}; manual re-enable required")]
    Failed(String),
}

/// Protection lifecycle states.
///
/// INACTIVE -> MONITORING <-> TRIGGERED -> EXECUTING -> {EXITED | MONITORING}
/// MONITORING -> FAILED only on unrecoverable configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProtectionState {
    Inactive,
    Monitoring,
    Triggered,
    Executing,
    Exited,
    Failed,
}

impl ProtectionState {
    /// Whether the scheduler should evaluate a token in this state.
    pub fn is_evaluable(&self) -> bool {
        matches!(self, ProtectionState::Monitoring)
    }

    /// Terminal states require explicit user action to leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtectionState::Exited | ProtectionState::Failed)
    }

    fn can_transition_to(&self, to: ProtectionState) -> bool {
        use ProtectionState::*;
        matches!(
            (self, to),
            (Inactive, Monitoring)
                | (Monitoring, Triggered)
                | (Monitoring, Inactive)
                | (Monitoring, Failed)
                | (Triggered, Executing)
                | (Triggered, Monitoring)
                | (Executing, Exited)
                | (Executing, Monitoring)
                | (Failed, Monitoring)
        )
    }
}

/// Identity of a protected token: unique per (wallet, mint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    pub wallet: String,
    pub mint: String,
}

impl TokenKey {
    pub fn new(wallet: impl Into<String>, mint: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            mint: mint.into(),
        }
    }
}

impl std::fmt::Display for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.wallet, self.mint)
    }
}

/// A token under protection for one wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedToken {
    pub key: TokenKey,
    pub settings: ProtectionSettings,
    pub state: ProtectionState,
    pub last_risk_score: Option<u8>,
    pub last_risk_level: Option<RiskLevel>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ProtectedToken {
    pub fn new(key: TokenKey, settings: ProtectionSettings) -> Self {
        Self {
            key,
            settings,
            state: ProtectionState::Inactive,
            last_risk_score: None,
            last_risk_level: None,
            last_evaluated_at: None,
            created_at: Utc::now(),
        }
    }

    /// Validated state transition.
    pub fn transition(&mut self, to: ProtectionState) -> Result<(), StateError> {
        if !self.state.can_transition_to(to) {
            return Err(StateError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(token = %self.key, from = ?self.state, to = ?to, "state transition");
        self.state = to;
        Ok(())
    }

    /// Record the outcome of one evaluation cycle.
    pub fn record_evaluation(&mut self, breakdown: &ScoreBreakdown, at: DateTime<Utc>) {
        self.last_risk_score = Some(breakdown.score);
        self.last_risk_level = Some(breakdown.level);
        self.last_evaluated_at = Some(at);
    }

    /// Whether the scored level crosses this token's configured threshold.
    pub fn should_trigger(&self, level: RiskLevel) -> bool {
        self.settings.auto_sell_enabled && level >= self.settings.risk_threshold.trigger_level()
    }
}
