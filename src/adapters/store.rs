//! Settings and Intent Stores
//!
//! `FileSettingsStore` is the default backing for protection settings: a
//! single JSON file so CLI invocations and the run loop see the same
//! records. The in-memory variants back tests and the intent store (intents
//! are per-run bookkeeping, reconciled on-chain by signature). A
//! database-backed adapter can replace any of these behind the same traits.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::intent::ExitIntent;
use crate::domain::settings::ProtectionSettings;
use crate::domain::token::TokenKey;
use crate::ports::store::{IntentStore, SettingsStore, StoreError, StoredToken};

/// In-memory settings store with per-(wallet, mint) rows and a wallet-level
/// default row.
#[derive(Default)]
pub struct InMemorySettingsStore {
    rows: RwLock<HashMap<TokenKey, ProtectionSettings>>,
    wallet_defaults: RwLock<HashMap<String, ProtectionSettings>>,
    // Test hooks
    failing_mints: RwLock<HashSet<String>>,
    corrupt_wallets: RwLock<HashSet<String>>,
    reads: AtomicU64,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend reads served (cache-behavior assertions).
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make upserts for one mint fail (bulk best-effort assertions).
    pub async fn fail_upsert_for(&self, mint: &str) {
        self.failing_mints.write().await.insert(mint.to_string());
    }

    /// Plant a record with no mint identity for one wallet.
    pub async fn insert_corrupt_record(&self, wallet: &str) {
        self.corrupt_wallets.write().await.insert(wallet.to_string());
    }

    pub async fn wallet_default(&self, wallet: &str) -> Option<ProtectionSettings> {
        self.wallet_defaults.read().await.get(wallet).cloned()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, key: &TokenKey) -> Result<Option<ProtectionSettings>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn upsert(
        &self,
        key: &TokenKey,
        settings: ProtectionSettings,
    ) -> Result<bool, StoreError> {
        if self.failing_mints.read().await.contains(&key.mint) {
            return Err(StoreError::Backend(format!(
                "simulated write failure for {}",
                key.mint
            )));
        }
        let created = self.rows.write().await.insert(key.clone(), settings).is_none();
        Ok(created)
    }

    async fn upsert_wallet_default(
        &self,
        wallet: &str,
        settings: ProtectionSettings,
    ) -> Result<(), StoreError> {
        self.wallet_defaults
            .write()
            .await
            .insert(wallet.to_string(), settings);
        Ok(())
    }

    async fn list_wallet_tokens(&self, wallet: &str) -> Result<Vec<StoredToken>, StoreError> {
        let mut tokens: Vec<StoredToken> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.wallet == wallet)
            .map(|(key, settings)| StoredToken {
                mint: key.mint.clone(),
                settings: settings.clone(),
            })
            .collect();
        tokens.sort_by(|a, b| a.mint.cmp(&b.mint));

        if self.corrupt_wallets.read().await.contains(wallet) {
            tokens.push(StoredToken {
                mint: String::new(),
                settings: ProtectionSettings::default(),
            });
        }
        Ok(tokens)
    }

    async fn delete(&self, key: &TokenKey) -> Result<(), StoreError> {
        self.rows.write().await.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenRecord {
    key: TokenKey,
    settings: ProtectionSettings,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    tokens: Vec<TokenRecord>,
    wallet_defaults: HashMap<String, ProtectionSettings>,
}

/// JSON-file settings store. Every mutation rewrites the file, so separate
/// processes (one-shot CLI commands, the run loop) operate on the same
/// records.
pub struct FileSettingsStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

impl FileSettingsStore {
    /// Open (or create) the store at `path`. A missing file is an empty
    /// store; an unreadable or malformed one is a backend error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Backend(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileState::default(),
            Err(e) => return Err(StoreError::Backend(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &FileState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Backend(format!("{}: {e}", parent.display())))?;
            }
        }
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, key: &TokenKey) -> Result<Option<ProtectionSettings>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .tokens
            .iter()
            .find(|r| &r.key == key)
            .map(|r| r.settings.clone()))
    }

    async fn upsert(
        &self,
        key: &TokenKey,
        settings: ProtectionSettings,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let created = match state.tokens.iter().position(|r| &r.key == key) {
            Some(idx) => {
                state.tokens[idx].settings = settings;
                false
            }
            None => {
                state.tokens.push(TokenRecord {
                    key: key.clone(),
                    settings,
                });
                true
            }
        };
        self.persist(&state).await?;
        Ok(created)
    }

    async fn upsert_wallet_default(
        &self,
        wallet: &str,
        settings: ProtectionSettings,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.wallet_defaults.insert(wallet.to_string(), settings);
        self.persist(&state).await
    }

    async fn list_wallet_tokens(&self, wallet: &str) -> Result<Vec<StoredToken>, StoreError> {
        let mut tokens: Vec<StoredToken> = self
            .state
            .read()
            .await
            .tokens
            .iter()
            .filter(|r| r.key.wallet == wallet)
            .map(|r| StoredToken {
                mint: r.key.mint.clone(),
                settings: r.settings.clone(),
            })
            .collect();
        tokens.sort_by(|a, b| a.mint.cmp(&b.mint));
        Ok(tokens)
    }

    async fn delete(&self, key: &TokenKey) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.tokens.retain(|r| &r.key != key);
        self.persist(&state).await
    }
}

/// In-memory intent store keyed by intent id, with a per-token index of the
/// live intent.
#[derive(Default)]
pub struct InMemoryIntentStore {
    by_id: RwLock<HashMap<String, ExitIntent>>,
    active_by_token: RwLock<HashMap<TokenKey, String>>,
    // Test hooks
    puts: AtomicU64,
    fail_puts_after: RwLock<Option<u64>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total intents ever recorded (test assertions).
    pub async fn intent_count(&self) -> usize {
        self.by_id.read().await.len()
    }

    /// Make every `put` after the first `n` fail (bookkeeping-failure
    /// assertions).
    pub async fn fail_puts_after(&self, n: u64) {
        *self.fail_puts_after.write().await = Some(n);
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn active_intent(&self, key: &TokenKey) -> Result<Option<ExitIntent>, StoreError> {
        let active = self.active_by_token.read().await.get(key).cloned();
        match active {
            Some(id) => Ok(self.by_id.read().await.get(&id).cloned()),
            None => Ok(None),
        }
    }

    async fn put(&self, intent: &ExitIntent) -> Result<(), StoreError> {
        if intent.id.is_empty() {
            return Err(StoreError::MissingIdentity(intent.key.to_string()));
        }
        let seq = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = *self.fail_puts_after.read().await {
            if seq > limit {
                return Err(StoreError::Backend("simulated intent write failure".to_string()));
            }
        }
        self.by_id
            .write()
            .await
            .insert(intent.id.clone(), intent.clone());

        let mut active = self.active_by_token.write().await;
        if intent.status.is_terminal() {
            // Only clear the index if it still points at this intent
            if active.get(&intent.key).map(String::as_str) == Some(intent.id.as_str()) {
                active.remove(&intent.key);
            }
        } else {
            active.insert(intent.key.clone(), intent.id.clone());
        }
        Ok(())
    }

    async fn get(&self, intent_id: &str) -> Result<Option<ExitIntent>, StoreError> {
        Ok(self.by_id.read().await.get(intent_id).cloned())
    }
}
