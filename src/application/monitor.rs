//! Protection Monitor
//!
//! Drives the per-token protection state machine:
//!
//! INACTIVE -> MONITORING <-> TRIGGERED -> EXECUTING -> {EXITED | MONITORING}
//!
//! Single-writer per token: each [`ProtectedToken`] sits behind its own
//! `tokio::Mutex`, held across the whole evaluate -> trigger -> execute span.
//! A cycle that finds the lock taken skips instead of queueing, so signals
//! arriving while an exit executes never stack up evaluations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::application::aggregator::SignalAggregator;
use crate::application::executor::{ExecutorError, ExitExecutor};
use crate::application::rate_limit::RateLimiter;
use crate::application::settings_manager::{
    BulkToggleResult, SettingsManager, SettingsManagerError,
};
use crate::domain::intent::{ExitIntent, IntentError, IntentStatus, TriggerReason};
use crate::domain::scorer::{self, RiskLevel, ScoreBreakdown};
use crate::domain::settings::ProtectionSettings;
use crate::domain::signal::RiskSignal;
use crate::domain::token::{ProtectedToken, ProtectionState, StateError, TokenKey};
use crate::ports::notify::{Notifier, ProtectionEvent};
use crate::ports::signals::SignalFetcher;
use crate::ports::store::{IntentStore, StoreError};
use crate::ports::wallet::{WalletError, WalletPort};

/// Upper bound on one signal fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("token {0} is not under protection")]
    NotTracked(TokenKey),

    #[error(transparent)]
    Settings(#[from] SettingsManagerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// What one evaluation cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Another task holds the token (an exit is executing); skipped.
    Busy,
    /// Token not in an evaluable state (inactive, exited, failed).
    NotEvaluable(ProtectionState),
    /// Scored below the trigger threshold, or triggering was suppressed.
    Scored { score: u8, level: RiskLevel },
    /// Exit executed and confirmed.
    Exited { intent_id: String, tx_signature: String },
    /// Exit attempted and failed; token back to monitoring.
    ExitFailed { intent_id: String, reason: String },
    /// Unrecoverable configuration error; manual re-enable required.
    ProtectionFailed { reason: String },
}

/// Point-in-time view of one protected token for the status surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenStatus {
    pub key: TokenKey,
    pub state: ProtectionState,
    pub auto_sell_enabled: bool,
    pub last_risk_score: Option<u8>,
    pub last_risk_level: Option<RiskLevel>,
    pub last_evaluated_at: Option<chrono::DateTime<Utc>>,
}

pub struct ProtectionMonitor {
    tokens: RwLock<HashMap<TokenKey, Arc<Mutex<ProtectedToken>>>>,
    settings: Arc<SettingsManager>,
    fetchers: Vec<Arc<dyn SignalFetcher>>,
    aggregator: Arc<SignalAggregator>,
    executor: Arc<ExitExecutor>,
    intents: Arc<dyn IntentStore>,
    notifier: Arc<dyn Notifier>,
    wallet: Arc<dyn WalletPort>,
    limiter: RateLimiter,
}

impl ProtectionMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Arc<SettingsManager>,
        fetchers: Vec<Arc<dyn SignalFetcher>>,
        aggregator: Arc<SignalAggregator>,
        executor: Arc<ExitExecutor>,
        intents: Arc<dyn IntentStore>,
        notifier: Arc<dyn Notifier>,
        wallet: Arc<dyn WalletPort>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            settings,
            fetchers,
            aggregator,
            executor,
            intents,
            notifier,
            wallet,
            limiter,
        }
    }

    /// Put a token under protection (or re-enable a failed one).
    ///
    /// Credentials are checked here when auto-sell is on: a missing keypair
    /// is a configuration error the user must see at write time, not a
    /// surprise when an exit fires.
    pub async fn enable(
        &self,
        key: TokenKey,
        settings: ProtectionSettings,
    ) -> Result<(), MonitorError> {
        if settings.auto_sell_enabled {
            self.wallet.verify_credentials()?;
        }
        let validated = self.settings.set(&key, settings).await?;

        let entry = {
            let mut tokens = self.tokens.write().await;
            tokens
                .entry(key.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(ProtectedToken::new(key.clone(), validated.clone())))
                })
                .clone()
        };

        let mut token = entry.lock().await;
        token.settings = validated;
        match token.state {
            ProtectionState::Inactive | ProtectionState::Failed => {
                token.transition(ProtectionState::Monitoring)?;
            }
            _ => {}
        }
        tracing::info!(token = %key, state = ?token.state, "protection enabled");
        Ok(())
    }

    /// Explicit disable: auto-sell off and evaluation parked in INACTIVE.
    /// A token mid-exit keeps its lock; the in-flight intent completes and
    /// the refreshed settings block any new trigger.
    pub async fn disable(&self, key: &TokenKey) -> Result<(), MonitorError> {
        let current = self
            .settings
            .get(key)
            .await?
            .ok_or_else(|| MonitorError::NotTracked(key.clone()))?;
        self.settings
            .set(
                key,
                ProtectionSettings {
                    auto_sell_enabled: false,
                    ..current
                },
            )
            .await?;

        if let Some(entry) = self.tokens.read().await.get(key).cloned() {
            if let Ok(mut token) = entry.try_lock() {
                token.settings.auto_sell_enabled = false;
                if token.state == ProtectionState::Monitoring {
                    token.transition(ProtectionState::Inactive)?;
                }
            }
        }
        tracing::info!(token = %key, "protection disabled");
        Ok(())
    }

    /// Wallet-wide auto-sell toggle. Persists per-token settings
    /// best-effort through the settings manager, then parks or wakes the
    /// registered tokens whose store write succeeded. A busy token is
    /// mid-exit; its next cycle re-reads the store.
    pub async fn bulk_set_enabled(
        &self,
        wallet: &str,
        enabled: bool,
    ) -> Result<BulkToggleResult, MonitorError> {
        if enabled {
            self.wallet.verify_credentials()?;
        }
        let result = self.settings.bulk_set_enabled(wallet, enabled).await?;
        let failed: std::collections::HashSet<&str> =
            result.failed.iter().map(|f| f.mint.as_str()).collect();

        let entries: Vec<Arc<Mutex<ProtectedToken>>> = self
            .tokens
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.wallet == wallet && !failed.contains(k.mint.as_str()))
            .map(|(_, v)| v.clone())
            .collect();
        for entry in entries {
            if let Ok(mut token) = entry.try_lock() {
                token.settings.auto_sell_enabled = enabled;
                match (token.state, enabled) {
                    (ProtectionState::Monitoring, false) => {
                        token.transition(ProtectionState::Inactive)?;
                    }
                    (ProtectionState::Inactive, true) => {
                        token.transition(ProtectionState::Monitoring)?;
                    }
                    _ => {}
                }
            }
        }
        Ok(result)
    }

    /// Remove a token from protection entirely. Any executing exit holds its
    /// own handle and finishes on its own.
    pub async fn remove(&self, key: &TokenKey) -> Result<(), MonitorError> {
        self.tokens.write().await.remove(key);
        self.settings.remove(key).await?;
        self.aggregator.forget(&key.mint).await;
        tracing::info!(token = %key, "protection removed");
        Ok(())
    }

    /// Tokens currently registered, for the scheduler.
    pub async fn tracked_keys(&self) -> Vec<TokenKey> {
        self.tokens.read().await.keys().cloned().collect()
    }

    /// Tokens with premium mempool monitoring enabled, for the watcher.
    pub async fn mempool_keys(&self) -> Vec<TokenKey> {
        let entries: Vec<Arc<Mutex<ProtectedToken>>> =
            self.tokens.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for entry in entries {
            // A busy token is mid-exit; it needs no new subscription.
            if let Ok(token) = entry.try_lock() {
                if token.settings.mempool_monitoring {
                    out.push(token.key.clone());
                }
            }
        }
        out
    }

    /// Status snapshot for the CLI.
    pub async fn status(&self) -> Vec<TokenStatus> {
        let entries: Vec<Arc<Mutex<ProtectedToken>>> =
            self.tokens.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let token = entry.lock().await;
            out.push(TokenStatus {
                key: token.key.clone(),
                state: token.state,
                auto_sell_enabled: token.settings.auto_sell_enabled,
                last_risk_score: token.last_risk_score,
                last_risk_level: token.last_risk_level,
                last_evaluated_at: token.last_evaluated_at,
            });
        }
        out.sort_by(|a, b| a.key.mint.cmp(&b.key.mint));
        out
    }

    /// Push one externally observed signal (mempool watcher) into the
    /// aggregator.
    pub async fn ingest_signal(&self, signal: RiskSignal) {
        self.aggregator.ingest(signal).await;
    }

    /// One full evaluation cycle for a token: poll sources, snapshot, score,
    /// and execute the exit when the threshold is crossed.
    pub async fn evaluate(&self, key: &TokenKey) -> Result<EvaluationOutcome, MonitorError> {
        let entry = self
            .tokens
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| MonitorError::NotTracked(key.clone()))?;

        // Skip, never queue: if the lock is held an exit is in progress and
        // this cycle's signals will be seen by the next one.
        let mut token = match entry.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(token = %key, "evaluation skipped, token busy");
                return Ok(EvaluationOutcome::Busy);
            }
        };

        if !token.state.is_evaluable() {
            return Ok(EvaluationOutcome::NotEvaluable(token.state));
        }

        self.poll_sources(&key.mint).await;
        let snapshot = self.aggregator.snapshot(&key.mint).await;
        let breakdown = scorer::score(&snapshot);
        token.record_evaluation(&breakdown, Utc::now());
        tracing::debug!(
            token = %key,
            score = breakdown.score,
            level = %breakdown.level,
            "evaluation complete"
        );

        // Re-read settings after scoring: a disable that landed during this
        // cycle cancels the trigger decision.
        if let Some(latest) = self.settings.get(key).await? {
            token.settings = latest;
        }

        if !token.should_trigger(breakdown.level) {
            return Ok(EvaluationOutcome::Scored {
                score: breakdown.score,
                level: breakdown.level,
            });
        }

        // At most one non-terminal intent per (wallet, mint).
        if let Some(live) = self.intents.active_intent(key).await? {
            tracing::warn!(token = %key, intent = %live.id, "trigger suppressed, intent already live");
            return Ok(EvaluationOutcome::Scored {
                score: breakdown.score,
                level: breakdown.level,
            });
        }

        self.trigger_exit(&mut token, &breakdown).await
    }

    /// Trigger path: create the intent, walk the state machine, and drive
    /// the exit to a terminal status while still holding the token lock.
    async fn trigger_exit(
        &self,
        token: &mut ProtectedToken,
        breakdown: &ScoreBreakdown,
    ) -> Result<EvaluationOutcome, MonitorError> {
        let key = token.key.clone();

        // Credentials revoked since enable time are unrecoverable from
        // inside the loop: park the token until a manual re-enable.
        if let Err(e) = self.wallet.verify_credentials() {
            token.transition(ProtectionState::Failed)?;
            tracing::error!(token = %key, error = %e, "protection failed: unusable credentials");
            self.notifier
                .notify(&key, ProtectionEvent::Failed { reason: e.to_string() })
                .await;
            return Ok(EvaluationOutcome::ProtectionFailed {
                reason: e.to_string(),
            });
        }

        let summary = breakdown
            .factors
            .iter()
            .filter(|f| !f.uncertain)
            .max_by_key(|f| f.sub_score * f.weight)
            .map(|f| f.detail.clone())
            .unwrap_or_else(|| "no fresh signal detail".to_string());

        let mut intent = ExitIntent::new(
            key.clone(),
            TriggerReason {
                score: breakdown.score,
                level: breakdown.level.to_string(),
                summary: summary.clone(),
            },
        );
        self.intents.put(&intent).await?;
        token.transition(ProtectionState::Triggered)?;
        tracing::warn!(
            token = %key,
            intent = %intent.id,
            score = breakdown.score,
            level = %breakdown.level,
            summary = %summary,
            "protection triggered"
        );
        self.notifier
            .notify(
                &key,
                ProtectionEvent::Triggered {
                    score: breakdown.score,
                    level: breakdown.level.to_string(),
                    summary,
                },
            )
            .await;

        let amount = match self.wallet.token_balance(&key.mint).await {
            Ok(0) => {
                // Nothing to sell: abort before any submission.
                intent.mark_aborted("zero token balance")?;
                self.intents.put(&intent).await?;
                token.transition(ProtectionState::Monitoring)?;
                tracing::warn!(token = %key, "trigger aborted, zero balance");
                return Ok(EvaluationOutcome::ExitFailed {
                    intent_id: intent.id.clone(),
                    reason: "zero token balance".to_string(),
                });
            }
            Ok(amount) => amount,
            Err(e) => {
                intent.mark_failed(e.to_string())?;
                self.intents.put(&intent).await?;
                token.transition(ProtectionState::Monitoring)?;
                self.notifier
                    .notify(&key, ProtectionEvent::Failed { reason: e.to_string() })
                    .await;
                return Ok(EvaluationOutcome::ExitFailed {
                    intent_id: intent.id.clone(),
                    reason: e.to_string(),
                });
            }
        };

        token.transition(ProtectionState::Executing)?;
        let settings = token.settings.clone();
        let final_intent = match self.executor.execute(intent, &settings, amount).await {
            Ok(final_intent) => final_intent,
            Err(e) => {
                // Bookkeeping failure: the token must not stay parked in
                // EXECUTING, a state no later cycle can leave.
                token.transition(ProtectionState::Monitoring)?;
                return Err(e.into());
            }
        };

        match final_intent.status {
            IntentStatus::Confirmed => {
                token.transition(ProtectionState::Exited)?;
                let signature = final_intent.tx_signature.clone().unwrap_or_default();
                self.notifier
                    .notify(
                        &key,
                        ProtectionEvent::Exited {
                            tx_signature: signature.clone(),
                        },
                    )
                    .await;
                Ok(EvaluationOutcome::Exited {
                    intent_id: final_intent.id,
                    tx_signature: signature,
                })
            }
            _ => {
                let reason = final_intent
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "exit failed".to_string());
                token.transition(ProtectionState::Monitoring)?;
                self.notifier
                    .notify(&key, ProtectionEvent::Failed { reason: reason.clone() })
                    .await;
                Ok(EvaluationOutcome::ExitFailed {
                    intent_id: final_intent.id,
                    reason,
                })
            }
        }
    }

    /// Poll every configured source once, ingesting whatever arrives. A
    /// failing source degrades that signal to stale, nothing more.
    async fn poll_sources(&self, mint: &str) {
        for fetcher in &self.fetchers {
            self.limiter.acquire().await;
            match tokio::time::timeout(FETCH_TIMEOUT, fetcher.fetch(mint)).await {
                Ok(Ok(signal)) => self.aggregator.ingest(signal).await,
                Ok(Err(e)) => {
                    tracing::warn!(mint, source = ?fetcher.source(), error = %e, "signal fetch failed");
                }
                Err(_) => {
                    tracing::warn!(mint, source = ?fetcher.source(), "signal fetch timed out");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::{InMemoryIntentStore, InMemorySettingsStore};
    use crate::application::executor::ExecutorConfig;
    use crate::domain::settings::RiskThreshold;
    use crate::domain::signal::{HoneypotStatus, SignalSource, SignalValue};
    use crate::ports::mocks::{MockNotifier, MockSignalFetcher, MockSwapRouter, MockWallet};
    use crate::ports::store::SettingsStore;
    use crate::ports::swap::SwapError;

    struct Harness {
        monitor: Arc<ProtectionMonitor>,
        router: Arc<MockSwapRouter>,
        liquidity: Arc<MockSignalFetcher>,
        dev_wallet: Arc<MockSignalFetcher>,
        notifier: Arc<MockNotifier>,
        wallet: Arc<MockWallet>,
        intents: Arc<InMemoryIntentStore>,
        settings_store: Arc<InMemorySettingsStore>,
    }

    fn harness() -> Harness {
        let settings_store = Arc::new(InMemorySettingsStore::new());
        let settings = Arc::new(SettingsManager::new(settings_store.clone()));
        let intents: Arc<InMemoryIntentStore> = Arc::new(InMemoryIntentStore::new());
        let router = Arc::new(MockSwapRouter::new());
        let notifier = Arc::new(MockNotifier::new());
        let wallet = Arc::new(MockWallet::new("Wallet111"));
        wallet.set_balance("Mint111", 1_000_000);
        let limiter = RateLimiter::new(10_000, 10_000.0);

        let executor = Arc::new(ExitExecutor::new(
            router.clone(),
            intents.clone(),
            limiter.clone(),
            ExecutorConfig {
                confirm_timeout: Duration::from_secs(2),
                ..Default::default()
            },
        ));

        let liquidity = Arc::new(MockSignalFetcher::new(SignalSource::Liquidity));
        let dev_wallet = Arc::new(MockSignalFetcher::new(SignalSource::DevWallet));
        let fetchers: Vec<Arc<dyn SignalFetcher>> = vec![liquidity.clone(), dev_wallet.clone()];

        let monitor = Arc::new(ProtectionMonitor::new(
            settings,
            fetchers,
            Arc::new(SignalAggregator::new()),
            executor,
            intents.clone(),
            notifier.clone(),
            wallet.clone(),
            limiter,
        ));

        Harness {
            monitor,
            router,
            liquidity,
            dev_wallet,
            notifier,
            wallet,
            intents,
            settings_store,
        }
    }

    fn key() -> TokenKey {
        TokenKey::new("Wallet111", "Mint111")
    }

    fn rug_in_progress(h: &Harness) {
        h.liquidity.push(Ok(RiskSignal::new(
            "Mint111",
            SignalValue::Liquidity {
                liquidity_usd: 2_000.0,
                change_1h_pct: -95.0,
                change_24h_pct: -95.0,
                lp_locked_pct: Some(10.0),
            },
        )));
        h.dev_wallet.push(Ok(RiskSignal::new(
            "Mint111",
            SignalValue::DevWallet {
                dev_sold_pct: 80.0,
                honeypot: HoneypotStatus::Sellable,
            },
        )));
    }

    fn calm_market(h: &Harness) {
        h.liquidity.push(Ok(RiskSignal::new(
            "Mint111",
            SignalValue::Liquidity {
                liquidity_usd: 250_000.0,
                change_1h_pct: 0.5,
                change_24h_pct: 2.0,
                lp_locked_pct: Some(95.0),
            },
        )));
        h.dev_wallet.push(Ok(RiskSignal::new(
            "Mint111",
            SignalValue::DevWallet {
                dev_sold_pct: 0.0,
                honeypot: HoneypotStatus::Sellable,
            },
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_then_calm_evaluation_scores_without_trigger() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        calm_market(&h);

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        match outcome {
            EvaluationOutcome::Scored { level, .. } => {
                assert!(level < RiskLevel::High, "calm market scored {level}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(h.router.submission_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rug_scenario_triggers_single_exit() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        rug_in_progress(&h);

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        let signature = match outcome {
            EvaluationOutcome::Exited { tx_signature, .. } => tx_signature,
            other => panic!("expected exit, got {other:?}"),
        };
        assert!(!signature.is_empty());
        assert_eq!(h.router.submission_count(), 1);
        assert_eq!(h.intents.intent_count().await, 1);

        // Token is terminal now; further cycles do nothing.
        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert_eq!(
            outcome,
            EvaluationOutcome::NotEvaluable(ProtectionState::Exited)
        );
        assert_eq!(h.router.submission_count(), 1);

        // Triggered and Exited notifications both delivered.
        let events = h.notifier.events();
        assert!(matches!(events[0].1, ProtectionEvent::Triggered { score, .. } if score >= 80));
        assert!(matches!(events[1].1, ProtectionEvent::Exited { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_honeypot_forces_trigger() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        h.dev_wallet.push(Ok(RiskSignal::new(
            "Mint111",
            SignalValue::DevWallet {
                dev_sold_pct: 0.0,
                honeypot: HoneypotStatus::Confirmed,
            },
        )));

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));
        let events = h.notifier.events();
        assert!(matches!(
            &events[0].1,
            ProtectionEvent::Triggered { score: 100, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_respected() {
        let h = harness();
        h.monitor
            .enable(
                key(),
                ProtectionSettings {
                    risk_threshold: RiskThreshold::Critical,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // Moderate-ish conditions: stale-only snapshot floors at MODERATE.
        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(
            outcome,
            EvaluationOutcome::Scored {
                level: RiskLevel::Moderate,
                ..
            }
        ));
        assert_eq!(h.router.submission_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_only_token_scores_without_trigger() {
        let h = harness();
        h.monitor
            .enable(
                key(),
                ProtectionSettings {
                    auto_sell_enabled: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        rug_in_progress(&h);

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(
            outcome,
            EvaluationOutcome::Scored {
                level: RiskLevel::Critical,
                ..
            }
        ));
        assert_eq!(h.router.submission_count(), 0);
        assert_eq!(h.intents.intent_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_parks_token_until_reenabled() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        h.monitor.disable(&key()).await.unwrap();

        let status = h.monitor.status().await;
        assert_eq!(status[0].state, ProtectionState::Inactive);
        assert!(!status[0].auto_sell_enabled);

        // A parked token is not evaluated at all.
        rug_in_progress(&h);
        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert_eq!(
            outcome,
            EvaluationOutcome::NotEvaluable(ProtectionState::Inactive)
        );
        assert_eq!(h.router.submission_count(), 0);

        // Re-enabling resumes monitoring.
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        let status = h.monitor.status().await;
        assert_eq!(status[0].state, ProtectionState::Monitoring);
        calm_market(&h);
        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Scored { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_revoked_mid_protection_fails_token() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        h.wallet.break_credentials();
        rug_in_progress(&h);

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::ProtectionFailed { .. }));
        assert_eq!(h.router.submission_count(), 0);
        assert_eq!(h.intents.intent_count().await, 0);
        let status = h.monitor.status().await;
        assert_eq!(status[0].state, ProtectionState::Failed);
        assert!(h
            .notifier
            .events()
            .iter()
            .any(|(_, e)| matches!(e, ProtectionEvent::Failed { .. })));

        // Terminal until a manual re-enable with working credentials.
        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert_eq!(
            outcome,
            EvaluationOutcome::NotEvaluable(ProtectionState::Failed)
        );
        h.wallet.restore_credentials();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        assert_eq!(h.monitor.status().await[0].state, ProtectionState::Monitoring);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_toggle_parks_and_wakes_tokens() {
        let h = harness();
        for mint in ["MintA", "MintB", "MintC"] {
            h.monitor
                .enable(
                    TokenKey::new("Wallet111", mint),
                    ProtectionSettings::default(),
                )
                .await
                .unwrap();
        }

        let result = h.monitor.bulk_set_enabled("Wallet111", false).await.unwrap();
        assert_eq!(result.tokens_affected, 3);
        for status in h.monitor.status().await {
            assert_eq!(status.state, ProtectionState::Inactive);
            assert!(!status.auto_sell_enabled);
        }

        let result = h.monitor.bulk_set_enabled("Wallet111", true).await.unwrap();
        assert_eq!(result.tokens_affected, 3);
        for status in h.monitor.status().await {
            assert_eq!(status.state, ProtectionState::Monitoring);
            assert!(status.auto_sell_enabled);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_store_failure_mid_exit_returns_to_monitoring() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        // First write (intent creation) succeeds; the executor's attempt
        // bookkeeping write fails.
        h.intents.fail_puts_after(1).await;
        rug_in_progress(&h);

        let err = h.monitor.evaluate(&key()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Executor(_)));

        // The token must not be stranded in EXECUTING.
        let status = h.monitor.status().await;
        assert_eq!(status[0].state, ProtectionState::Monitoring);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_intent_suppresses_second_trigger() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();

        // A non-terminal intent already exists for this token.
        let planted = ExitIntent::new(
            key(),
            TriggerReason {
                score: 90,
                level: "CRITICAL".to_string(),
                summary: "earlier trigger".to_string(),
            },
        );
        h.intents.put(&planted).await.unwrap();

        rug_in_progress(&h);
        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Scored { .. }));
        assert_eq!(h.router.submission_count(), 0);
        assert_eq!(h.intents.intent_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_exit_returns_to_monitoring() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        h.router
            .push_quote(Err(SwapError::RouteUnavailable("Mint111".into())));
        rug_in_progress(&h);

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::ExitFailed { .. }));

        let status = h.monitor.status().await;
        assert_eq!(status[0].state, ProtectionState::Monitoring);
        assert!(h
            .notifier
            .events()
            .iter()
            .any(|(_, e)| matches!(e, ProtectionEvent::Failed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_balance_aborts_intent() {
        let h = harness();
        h.wallet.set_balance("Mint111", 0);
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        rug_in_progress(&h);

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        let intent_id = match outcome {
            EvaluationOutcome::ExitFailed { intent_id, .. } => intent_id,
            other => panic!("expected failed exit, got {other:?}"),
        };
        assert_eq!(h.router.submission_count(), 0);
        let stored = h.intents.get(&intent_id).await.unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_with_broken_credentials_rejected() {
        let h = harness();
        h.wallet.break_credentials();
        let err = h
            .monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Wallet(_)));
        assert!(h.monitor.status().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_disabled_skips_credential_check() {
        let h = harness();
        h.wallet.break_credentials();
        let settings = ProtectionSettings {
            auto_sell_enabled: false,
            ..Default::default()
        };
        // Watch-only protection is fine without a keypair.
        h.monitor.enable(key(), settings).await.unwrap();
        assert_eq!(h.monitor.status().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_unknown_token_errors() {
        let h = harness();
        assert!(matches!(
            h.monitor.evaluate(&key()).await,
            Err(MonitorError::NotTracked(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_clears_registry_and_settings() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        h.monitor.remove(&key()).await.unwrap();
        assert!(h.monitor.status().await.is_empty());
        assert!(h.settings_store.get(&key()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_evaluations_produce_one_exit() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        rug_in_progress(&h);
        rug_in_progress(&h);

        let a = tokio::spawn({
            let monitor = h.monitor.clone();
            async move { monitor.evaluate(&key()).await }
        });
        let b = tokio::spawn({
            let monitor = h.monitor.clone();
            async move { monitor.evaluate(&key()).await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        let exits = [&a, &b]
            .iter()
            .filter(|o| matches!(o, EvaluationOutcome::Exited { .. }))
            .count();
        assert_eq!(exits, 1, "outcomes: {a:?} / {b:?}");
        assert_eq!(h.router.submission_count(), 1);
        assert_eq!(h.intents.intent_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mempool_anomaly_ingested_and_scored() {
        let h = harness();
        h.monitor
            .enable(key(), ProtectionSettings::default())
            .await
            .unwrap();
        calm_market(&h);
        h.monitor
            .ingest_signal(RiskSignal::new(
                "Mint111",
                SignalValue::MempoolAnomaly {
                    kind: crate::domain::signal::AnomalyKind::LiquidityRemoval,
                    estimated_impact_pct: 92.0,
                    pending_signature: Some("pending_sig".to_string()),
                },
            ))
            .await;

        let outcome = h.monitor.evaluate(&key()).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));
    }
}
