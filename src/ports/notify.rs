//! Notification Port
//!
//! Fire-and-forget delivery to the external notification collaborator.
//! Best-effort: delivery failures are logged and never block the core.

use serde::{Deserialize, Serialize};

use crate::domain::token::TokenKey;

/// Protection lifecycle events worth telling the user about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "UPPERCASE")]
pub enum ProtectionEvent {
    Triggered {
        score: u8,
        level: String,
        summary: String,
    },
    Exited {
        tx_signature: String,
    },
    Failed {
        reason: String,
    },
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an event. Implementations must swallow their own errors.
    async fn notify(&self, key: &TokenKey, event: ProtectionEvent);
}
