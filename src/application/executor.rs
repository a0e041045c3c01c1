//! Exit Execution Engine
//!
//! Builds, submits, and confirms the emergency swap for one [`ExitIntent`].
//! Owns retry/backoff and idempotency: transient infrastructure errors are
//! retried with exponential backoff because no funds have moved; terminal
//! execution errors fail the intent immediately. A submitted transaction is
//! never resubmitted while its signature may still be in flight, including
//! across process restarts.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;

use crate::application::rate_limit::RateLimiter;
use crate::domain::intent::{ExitIntent, IntentError, IntentStatus};
use crate::domain::settings::ProtectionSettings;
use crate::ports::store::{IntentStore, StoreError};
use crate::ports::swap::{SwapError, SwapRoutingPort, TxStatus};

/// Retry and confirmation tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// First backoff delay after a transient failure
    pub retry_base: Duration,
    /// Multiplier applied per retry
    pub retry_factor: u32,
    /// Maximum submission attempts per intent
    pub max_attempts: u32,
    /// How long to poll for on-chain confirmation
    pub confirm_timeout: Duration,
    /// Delay between confirmation polls
    pub confirm_poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_base: Duration::from_millis(250),
            retry_factor: 2,
            max_attempts: 5,
            confirm_timeout: Duration::from_secs(30),
            confirm_poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("intent bookkeeping error: {0}")]
    Intent(#[from] IntentError),

    #[error("intent store error: {0}")]
    Store(#[from] StoreError),
}

/// Drives one intent to a terminal status. The business outcome (confirmed,
/// failed, reason) lives on the returned intent; `Err` is reserved for
/// bookkeeping failures.
pub struct ExitExecutor {
    router: Arc<dyn SwapRoutingPort>,
    intents: Arc<dyn IntentStore>,
    limiter: RateLimiter,
    config: ExecutorConfig,
}

impl ExitExecutor {
    pub fn new(
        router: Arc<dyn SwapRoutingPort>,
        intents: Arc<dyn IntentStore>,
        limiter: RateLimiter,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            router,
            intents,
            limiter,
            config,
        }
    }

    /// Execute an emergency exit of `amount` base units of the intent's
    /// token into SOL.
    pub async fn execute(
        &self,
        mut intent: ExitIntent,
        settings: &ProtectionSettings,
        amount: u64,
    ) -> Result<ExitIntent, ExecutorError> {
        // Restart/retry dedupe: if a prior attempt already submitted, the
        // transaction may still land - reconcile instead of resubmitting.
        if intent.possibly_in_flight() {
            tracing::info!(
                intent = %intent.id,
                signature = ?intent.tx_signature,
                "prior submission possibly in flight, reconciling"
            );
            return self.confirm(intent).await;
        }

        if intent.status != IntentStatus::Pending {
            tracing::warn!(intent = %intent.id, status = ?intent.status, "intent not executable");
            return Ok(intent);
        }

        loop {
            let attempt = intent.record_attempt()?;
            self.intents.put(&intent).await?;

            match self.try_submit(&intent, settings, amount).await {
                Ok(signature) => {
                    intent.mark_submitted(signature)?;
                    self.intents.put(&intent).await?;
                    return self.confirm(intent).await;
                }
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        intent = %intent.id,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "transient submit failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    intent.mark_failed(format!(
                        "retries exhausted after {} attempts: {}",
                        attempt, e
                    ))?;
                    self.intents.put(&intent).await?;
                    tracing::error!(intent = %intent.id, error = %e, "exit failed: retries exhausted");
                    return Ok(intent);
                }
                Err(e) => {
                    // Terminal execution error: no point retrying
                    intent.mark_failed(e.to_string())?;
                    self.intents.put(&intent).await?;
                    tracing::error!(intent = %intent.id, error = %e, "exit failed terminally");
                    return Ok(intent);
                }
            }
        }
    }

    /// One quote + submit round trip.
    async fn try_submit(
        &self,
        intent: &ExitIntent,
        settings: &ProtectionSettings,
        amount: u64,
    ) -> Result<String, SwapError> {
        self.limiter.acquire().await;
        let route = self
            .router
            .quote(&intent.key.mint, amount, settings.max_slippage_bps)
            .await?;

        let priority_fee = settings.priority_fee_lamports(route.base_fee_lamports);
        tracing::info!(
            intent = %intent.id,
            in_amount = route.in_amount,
            min_out = route.min_out_amount,
            priority_fee,
            "submitting emergency exit"
        );

        self.limiter.acquire().await;
        self.router.submit(&route, priority_fee).await
    }

    /// Poll for confirmation up to the timeout, then reconcile once by
    /// signature lookup before deciding FAILED - the transaction may land
    /// after the poll window.
    async fn confirm(&self, mut intent: ExitIntent) -> Result<ExitIntent, ExecutorError> {
        let signature = match intent.tx_signature.clone() {
            Some(sig) => sig,
            None => {
                intent.mark_failed("submitted intent has no signature fingerprint")?;
                self.intents.put(&intent).await?;
                return Ok(intent);
            }
        };

        let deadline = Instant::now() + self.config.confirm_timeout;
        while Instant::now() < deadline {
            self.limiter.acquire().await;
            match self.router.status(&signature).await {
                Ok(TxStatus::Confirmed) => {
                    intent.mark_confirmed()?;
                    self.intents.put(&intent).await?;
                    tracing::info!(intent = %intent.id, signature, "exit confirmed");
                    return Ok(intent);
                }
                Ok(TxStatus::Failed) => {
                    intent.mark_failed("transaction failed on-chain")?;
                    self.intents.put(&intent).await?;
                    return Ok(intent);
                }
                Ok(TxStatus::Pending) => {}
                Err(e) => {
                    tracing::warn!(intent = %intent.id, error = %e, "status poll failed");
                }
            }
            tokio::time::sleep(self.config.confirm_poll_interval).await;
        }

        // Final reconcile after the window.
        self.limiter.acquire().await;
        match self.router.status(&signature).await {
            Ok(TxStatus::Confirmed) => {
                intent.mark_confirmed()?;
                tracing::info!(intent = %intent.id, signature, "exit confirmed after poll window");
            }
            Ok(TxStatus::Failed) => {
                intent.mark_failed("transaction failed on-chain")?;
            }
            Ok(TxStatus::Pending) | Err(_) => {
                intent.mark_failed(format!(
                    "confirmation timed out after {:?}",
                    self.config.confirm_timeout
                ))?;
            }
        }
        self.intents.put(&intent).await?;
        Ok(intent)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.retry_factor.saturating_pow(attempt.saturating_sub(1));
        let base = self.config.retry_base.saturating_mul(exp);
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4 + 1);
        base + Duration::from_millis(jitter_ms)
    }
}
