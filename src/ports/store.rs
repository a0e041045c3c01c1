//! Store Ports
//!
//! Persistence seams for protection settings and exit intents. The core
//! never assumes a storage technology; in-memory adapters back the default
//! wiring and the tests.

use thiserror::Error;

use crate::domain::intent::ExitIntent;
use crate::domain::settings::ProtectionSettings;
use crate::domain::token::TokenKey;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record has no identity: {0}")]
    MissingIdentity(String),
}

/// A wallet's protected-token record as seen by the bulk toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredToken {
    /// Empty mint means a corrupt record; surfaced as a hard per-item error.
    pub mint: String,
    pub settings: ProtectionSettings,
}

/// Key-value upsert over (wallet, mint) -> settings, plus a wallet-level
/// default record consulted when a token has no explicit row.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &TokenKey) -> Result<Option<ProtectionSettings>, StoreError>;

    async fn upsert(&self, key: &TokenKey, settings: ProtectionSettings)
        -> Result<bool, StoreError>;

    /// Upsert the wallet-level default consulted for new tokens.
    async fn upsert_wallet_default(
        &self,
        wallet: &str,
        settings: ProtectionSettings,
    ) -> Result<(), StoreError>;

    /// All token records for a wallet (including corrupt ones, so the bulk
    /// toggle can report them itemized).
    async fn list_wallet_tokens(&self, wallet: &str) -> Result<Vec<StoredToken>, StoreError>;

    async fn delete(&self, key: &TokenKey) -> Result<(), StoreError>;
}

/// Persistence for exit intents; backs the at-most-once invariant across
/// process restarts.
#[async_trait::async_trait]
pub trait IntentStore: Send + Sync {
    /// The live (non-terminal) intent for a token, if any.
    async fn active_intent(&self, key: &TokenKey) -> Result<Option<ExitIntent>, StoreError>;

    /// Insert or replace an intent record (keyed by intent id).
    async fn put(&self, intent: &ExitIntent) -> Result<(), StoreError>;

    async fn get(&self, intent_id: &str) -> Result<Option<ExitIntent>, StoreError>;
}
