//! Exit Intents
//!
//! One logical attempt to protectively sell a token, including its retry
//! chain. The `id` is an idempotency key minted once at trigger time and
//! reused for every retry; at most one non-terminal intent may exist per
//! (wallet, mint). Terminal statuses are immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::token::TokenKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntentError {
    #[error("intent {0} is terminal ({1:?}) and cannot change status")]
    Terminal(String, IntentStatus),

    #[error("invalid status change {from:?} -> {to:?} for intent {id}")]
    InvalidStatusChange {
        id: String,
        from: IntentStatus,
        to: IntentStatus,
    },
}

/// Lifecycle of an exit intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentStatus {
    /// Created, no transaction submitted yet
    Pending,
    /// A transaction is (possibly) in flight
    Submitted,
    /// Confirmed on-chain
    Confirmed,
    /// All retries exhausted or terminal execution error
    Failed,
    /// Cancelled before any funds moved
    Aborted,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Confirmed | IntentStatus::Failed | IntentStatus::Aborted
        )
    }
}

/// Why an intent was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerReason {
    pub score: u8,
    pub level: String,
    pub summary: String,
}

/// One emergency-exit attempt chain for a (wallet, mint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitIntent {
    /// Idempotency key, stable across retries of the same trigger
    pub id: String,
    pub key: TokenKey,
    pub trigger_reason: TriggerReason,
    pub created_at: DateTime<Utc>,
    pub status: IntentStatus,
    pub attempt_count: u32,
    /// Submission fingerprint: the signature of the first accepted submit.
    /// Set once; retries after a restart must not resubmit while this is
    /// possibly still in flight.
    pub tx_signature: Option<String>,
    /// Populated on FAILED for the notification collaborator
    pub failure_reason: Option<String>,
}

impl ExitIntent {
    pub fn new(key: TokenKey, trigger_reason: TriggerReason) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key,
            trigger_reason,
            created_at: Utc::now(),
            status: IntentStatus::Pending,
            attempt_count: 0,
            tx_signature: None,
            failure_reason: None,
        }
    }

    /// Record one more submission attempt. Attempts are ordered by this
    /// counter.
    pub fn record_attempt(&mut self) -> Result<u32, IntentError> {
        self.ensure_live()?;
        self.attempt_count += 1;
        Ok(self.attempt_count)
    }

    /// Mark as submitted with its transaction signature fingerprint.
    pub fn mark_submitted(&mut self, signature: impl Into<String>) -> Result<(), IntentError> {
        self.change_status(IntentStatus::Submitted)?;
        self.tx_signature = Some(signature.into());
        Ok(())
    }

    pub fn mark_confirmed(&mut self) -> Result<(), IntentError> {
        self.change_status(IntentStatus::Confirmed)
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), IntentError> {
        self.change_status(IntentStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Abort is only legal before anything was submitted.
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> Result<(), IntentError> {
        if self.status != IntentStatus::Pending {
            return Err(IntentError::InvalidStatusChange {
                id: self.id.clone(),
                from: self.status,
                to: IntentStatus::Aborted,
            });
        }
        self.status = IntentStatus::Aborted;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// A prior submit may still be in flight: true when a fingerprint exists
    /// and the intent has not reached a terminal status.
    pub fn possibly_in_flight(&self) -> bool {
        self.tx_signature.is_some() && !self.status.is_terminal()
    }

    fn ensure_live(&self) -> Result<(), IntentError> {
        if self.status.is_terminal() {
            return Err(IntentError::Terminal(self.id.clone(), self.status));
        }
        Ok(())
    }

    fn change_status(&mut self, to: IntentStatus) -> Result<(), IntentError> {
        self.ensure_live()?;
        let legal = matches!(
            (self.status, to),
            (IntentStatus::Pending, IntentStatus::Submitted)
                | (IntentStatus::Pending, IntentStatus::Failed)
                | (IntentStatus::Submitted, IntentStatus::Confirmed)
                | (IntentStatus::Submitted, IntentStatus::Failed)
        );
        if !legal {
            return Err(IntentError::InvalidStatusChange {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
