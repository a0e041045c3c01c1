//! Notification Adapters
//!
//! Webhook delivery of protection lifecycle events, plus a log-only
//! fallback when no webhook is configured. Both honor the port contract:
//! delivery failures are logged, never propagated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::token::TokenKey;
use crate::ports::notify::{Notifier, ProtectionEvent};

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    wallet: &'a str,
    mint: &'a str,
    #[serde(flatten)]
    event: &'a ProtectionEvent,
}

/// Posts each event as JSON to a configured webhook endpoint.
pub struct WebhookNotifier {
    config: WebhookConfig,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, key: &TokenKey, event: ProtectionEvent) {
        let payload = WebhookPayload {
            wallet: &key.wallet,
            mint: &key.mint,
            event: &event,
        };
        match self.http.post(&self.config.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(token = %key, ?event, "webhook delivered");
            }
            Ok(response) => {
                warn!(token = %key, status = %response.status(), "webhook rejected");
            }
            Err(e) => {
                warn!(token = %key, error = %e, "webhook delivery failed");
            }
        }
    }
}

/// Structured-log delivery for setups without a webhook.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, key: &TokenKey, event: ProtectionEvent) {
        match event {
            ProtectionEvent::Triggered {
                score,
                level,
                summary,
            } => {
                warn!(token = %key, score, %level, %summary, "protection triggered");
            }
            ProtectionEvent::Exited { tx_signature } => {
                info!(token = %key, %tx_signature, "emergency exit confirmed");
            }
            ProtectionEvent::Failed { reason } => {
                warn!(token = %key, %reason, "emergency exit failed");
            }
        }
    }
}
