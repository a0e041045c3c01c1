//! Settings & Bulk Toggle Manager
//!
//! Owns every settings write. Reads go through a bounded-TTL read-through
//! cache keyed by (wallet, mint); writes validate at the boundary and
//! invalidate the cache entry. The bulk toggle is per-token best-effort,
//! never transactional across tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::settings::{ProtectionSettings, SettingsError};
use crate::domain::token::TokenKey;
use crate::ports::store::{SettingsStore, StoreError, StoredToken};

/// Default TTL for cached settings reads
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SettingsManagerError {
    #[error("invalid settings: {0}")]
    Invalid(#[from] SettingsError),

    #[error("settings store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one token inside a bulk toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemFailure {
    pub mint: String,
    pub reason: String,
}

/// Itemized result of a wallet-wide enable/disable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkToggleResult {
    pub tokens_affected: u32,
    pub tokens_created: u32,
    pub tokens_updated: u32,
    pub failed: Vec<BulkItemFailure>,
}

struct CacheEntry {
    settings: ProtectionSettings,
    cached_at: Instant,
}

/// Read-through cached settings manager.
pub struct SettingsManager {
    store: Arc<dyn SettingsStore>,
    cache: RwLock<HashMap<TokenKey, CacheEntry>>,
    cache_ttl: Duration,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<dyn SettingsStore>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        }
    }

    /// Read settings for a token, served from cache within the TTL.
    pub async fn get(&self, key: &TokenKey) -> Result<Option<ProtectionSettings>, SettingsManagerError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(key) {
                if entry.cached_at.elapsed() < self.cache_ttl {
                    return Ok(Some(entry.settings.clone()));
                }
            }
        }

        let settings = self.store.get(key).await?;
        if let Some(ref settings) = settings {
            let mut cache = self.cache.write().await;
            cache.insert(
                key.clone(),
                CacheEntry {
                    settings: settings.clone(),
                    cached_at: Instant::now(),
                },
            );
        }
        Ok(settings)
    }

    /// Validate and persist settings for one token.
    pub async fn set(
        &self,
        key: &TokenKey,
        settings: ProtectionSettings,
    ) -> Result<ProtectionSettings, SettingsManagerError> {
        let validated = settings.validated()?;
        self.store.upsert(key, validated.clone()).await?;
        self.cache.write().await.remove(key);
        tracing::info!(token = %key, "settings updated");
        Ok(validated)
    }

    /// All stored token records for a wallet, uncached.
    pub async fn list_tokens(&self, wallet: &str) -> Result<Vec<StoredToken>, SettingsManagerError> {
        Ok(self.store.list_wallet_tokens(wallet).await?)
    }

    /// Remove a token's settings record (protection removal).
    pub async fn remove(&self, key: &TokenKey) -> Result<(), SettingsManagerError> {
        self.store.delete(key).await?;
        self.cache.write().await.remove(key);
        Ok(())
    }

    /// Enable or disable auto-sell for every token of a wallet.
    ///
    /// Upserts the wallet-level default first, then iterates tokens
    /// best-effort: individual failures are reported itemized and never
    /// abort the batch. A record without identity is a hard per-item error,
    /// not a silent skip. Disabling does not touch any already-executing
    /// exit intent.
    pub async fn bulk_set_enabled(
        &self,
        wallet: &str,
        enabled: bool,
    ) -> Result<BulkToggleResult, SettingsManagerError> {
        let default_settings = ProtectionSettings {
            auto_sell_enabled: enabled,
            ..ProtectionSettings::default()
        };
        self.store
            .upsert_wallet_default(wallet, default_settings)
            .await?;

        let tokens = self.store.list_wallet_tokens(wallet).await?;
        let mut result = BulkToggleResult::default();

        for stored in tokens {
            if stored.mint.is_empty() {
                tracing::warn!(wallet, "protected token record has no mint identity");
                result.failed.push(BulkItemFailure {
                    mint: String::new(),
                    reason: StoreError::MissingIdentity(wallet.to_string()).to_string(),
                });
                continue;
            }

            let key = TokenKey::new(wallet, stored.mint.clone());
            let updated_settings = ProtectionSettings {
                auto_sell_enabled: enabled,
                ..stored.settings
            };
            let updated_settings = match updated_settings.validated() {
                Ok(s) => s,
                Err(e) => {
                    result.failed.push(BulkItemFailure {
                        mint: stored.mint,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.store.upsert(&key, updated_settings).await {
                Ok(created) => {
                    self.cache.write().await.remove(&key);
                    if created {
                        result.tokens_created += 1;
                    } else {
                        result.tokens_updated += 1;
                    }
                    result.tokens_affected += 1;
                }
                Err(e) => {
                    tracing::warn!(token = %key, error = %e, "bulk toggle item failed");
                    result.failed.push(BulkItemFailure {
                        mint: stored.mint,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            wallet,
            enabled,
            affected = result.tokens_affected,
            created = result.tokens_created,
            updated = result.tokens_updated,
            failed = result.failed.len(),
            "bulk toggle complete"
        );
        Ok(result)
    }
}
