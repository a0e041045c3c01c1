//! Mempool Watcher
//!
//! Premium pre-confirmation stream: subscribes to processed-commitment log
//! notifications for every token with mempool monitoring enabled, classifies
//! rug-shaped patterns, and pushes `MEMPOOL_ANOMALY` signals plus a
//! preemption ping so the scheduler evaluates the token immediately.
//!
//! Best-effort by design: the polled sources remain the source of truth, so
//! a dropped connection degrades latency, never correctness.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::application::monitor::ProtectionMonitor;
use crate::domain::signal::{AnomalyKind, RiskSignal, SignalValue};
use crate::domain::token::TokenKey;

#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Websocket RPC endpoint
    pub ws_url: String,
    /// Delay before reconnecting after a dropped connection
    pub reconnect_delay: Duration,
    /// How often to reconcile subscriptions with the tracked token set
    pub resubscribe_interval: Duration,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.mainnet-beta.solana.com".to_string(),
            reconnect_delay: Duration::from_secs(2),
            resubscribe_interval: Duration::from_secs(30),
        }
    }
}

/// Rug-shaped pattern in a pending transaction's logs.
pub(crate) fn classify_logs(logs: &[String]) -> Option<(AnomalyKind, f64)> {
    for log in logs {
        if log.contains("Instruction: RemoveLiquidity")
            || log.contains("Instruction: Withdraw")
            || log.contains("remove_liquidity")
        {
            return Some((AnomalyKind::LiquidityRemoval, 90.0));
        }
        if log.contains("Instruction: SetAuthority") || log.contains("Instruction: FreezeAccount") {
            return Some((AnomalyKind::DevWalletTransfer, 80.0));
        }
    }
    None
}

/// Parsed pieces of one logsNotification frame.
pub(crate) struct LogEvent {
    pub subscription: u64,
    pub signature: String,
    pub logs: Vec<String>,
}

/// Extract subscription id, signature, and logs from a notification frame.
/// Returns `None` for anything else (subscription acks, pings, errors).
pub(crate) fn parse_notification(raw: &str) -> Option<LogEvent> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    if value.get("method")?.as_str()? != "logsNotification" {
        return None;
    }
    let params = value.get("params")?;
    let subscription = params.get("subscription")?.as_u64()?;
    let result = params.get("result")?.get("value")?;
    let signature = result.get("signature")?.as_str()?.to_string();
    let logs = result
        .get("logs")?
        .as_array()?
        .iter()
        .filter_map(|l| l.as_str().map(str::to_string))
        .collect();
    Some(LogEvent {
        subscription,
        signature,
        logs,
    })
}

fn subscribe_frame(request_id: u64, mint: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": "logsSubscribe",
        "params": [
            {"mentions": [mint]},
            {"commitment": "processed"}
        ]
    })
    .to_string()
}

pub struct MempoolWatcher {
    config: MempoolConfig,
    monitor: Arc<ProtectionMonitor>,
    preempt: mpsc::Sender<TokenKey>,
    shutdown_tx: watch::Sender<bool>,
}

impl MempoolWatcher {
    pub fn new(
        config: MempoolConfig,
        monitor: Arc<ProtectionMonitor>,
        preempt: mpsc::Sender<TokenKey>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            monitor,
            preempt,
            shutdown_tx,
        }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Connect-and-stream loop with reconnection. Returns when stopped.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tracing::info!(url = %self.config.ws_url, "mempool watcher started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            match connect_async(&self.config.ws_url).await {
                Ok((stream, _)) => {
                    if let Err(e) = self.stream_session(stream, &mut shutdown_rx).await {
                        tracing::warn!(error = %e, "mempool session ended");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "mempool connect failed");
                }
            }
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
        tracing::info!("mempool watcher stopped");
    }

    async fn stream_session(
        &self,
        stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (mut sink, mut source) = stream.split();

        // request id -> mint, filled as subscriptions are requested;
        // subscription id -> keys, filled as acks arrive.
        let mut next_request_id: u64 = 1;
        let mut pending: HashMap<u64, String> = HashMap::new();
        let mut subscribed_mints: Vec<String> = Vec::new();
        let mut by_subscription: HashMap<u64, Vec<TokenKey>> = HashMap::new();

        let mut resubscribe = tokio::time::interval(self.config.resubscribe_interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }

                _ = resubscribe.tick() => {
                    // Subscribe to any newly tracked mempool tokens.
                    for key in self.monitor.mempool_keys().await {
                        if subscribed_mints.contains(&key.mint)
                            || pending.values().any(|m| *m == key.mint)
                        {
                            continue;
                        }
                        let frame = subscribe_frame(next_request_id, &key.mint);
                        pending.insert(next_request_id, key.mint.clone());
                        next_request_id += 1;
                        sink.send(Message::Text(frame)).await?;
                        tracing::debug!(mint = %key.mint, "mempool subscription requested");
                    }
                }

                frame = source.next() => {
                    let Some(frame) = frame else { return Ok(()) };
                    match frame? {
                        Message::Text(raw) => {
                            self.handle_frame(
                                &raw,
                                &mut pending,
                                &mut subscribed_mints,
                                &mut by_subscription,
                            )
                            .await;
                        }
                        Message::Ping(payload) => {
                            sink.send(Message::Pong(payload)).await?;
                        }
                        Message::Close(_) => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }

    async fn handle_frame(
        &self,
        raw: &str,
        pending: &mut HashMap<u64, String>,
        subscribed_mints: &mut Vec<String>,
        by_subscription: &mut HashMap<u64, Vec<TokenKey>>,
    ) {
        // Subscription ack: {"id": N, "result": <subscription>}
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            if let (Some(id), Some(sub)) = (
                value.get("id").and_then(|v| v.as_u64()),
                value.get("result").and_then(|v| v.as_u64()),
            ) {
                if let Some(mint) = pending.remove(&id) {
                    let keys: Vec<TokenKey> = self
                        .monitor
                        .mempool_keys()
                        .await
                        .into_iter()
                        .filter(|k| k.mint == mint)
                        .collect();
                    subscribed_mints.push(mint);
                    by_subscription.insert(sub, keys);
                }
                return;
            }
        }

        let Some(event) = parse_notification(raw) else {
            return;
        };
        let Some((kind, impact)) = classify_logs(&event.logs) else {
            return;
        };
        let Some(keys) = by_subscription.get(&event.subscription) else {
            return;
        };

        for key in keys {
            tracing::warn!(
                token = %key,
                ?kind,
                impact,
                signature = %event.signature,
                "pending anomaly spotted"
            );
            self.monitor
                .ingest_signal(RiskSignal::new(
                    key.mint.clone(),
                    SignalValue::MempoolAnomaly {
                        kind,
                        estimated_impact_pct: impact,
                        pending_signature: Some(event.signature.clone()),
                    },
                ))
                .await;
            // Preemption is best-effort; a full queue means the scheduler
            // is already busy evaluating.
            if let Err(e) = self.preempt.try_send(key.clone()) {
                tracing::debug!(token = %key, error = %e, "preempt queue full");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_liquidity_removal() {
        let logs = vec![
            "Program 675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8 invoke [1]".to_string(),
            "Program log: Instruction: RemoveLiquidity".to_string(),
        ];
        assert_eq!(
            classify_logs(&logs),
            Some((AnomalyKind::LiquidityRemoval, 90.0))
        );
    }

    #[test]
    fn test_classify_withdraw() {
        let logs = vec!["Program log: Instruction: Withdraw".to_string()];
        assert!(matches!(
            classify_logs(&logs),
            Some((AnomalyKind::LiquidityRemoval, _))
        ));
    }

    #[test]
    fn test_classify_authority_change() {
        let logs = vec!["Program log: Instruction: SetAuthority".to_string()];
        assert_eq!(
            classify_logs(&logs),
            Some((AnomalyKind::DevWalletTransfer, 80.0))
        );
    }

    #[test]
    fn test_ordinary_swap_not_classified() {
        let logs = vec![
            "Program log: Instruction: Swap".to_string(),
            "Program log: ray_log: AwBA...".to_string(),
        ];
        assert_eq!(classify_logs(&logs), None);
    }

    #[test]
    fn test_parse_notification() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "subscription": 42,
                "result": {
                    "context": {"slot": 12345},
                    "value": {
                        "signature": "5h3k...sig",
                        "err": null,
                        "logs": ["Program log: Instruction: RemoveLiquidity"]
                    }
                }
            }
        }"#;
        let event = parse_notification(raw).expect("notification");
        assert_eq!(event.subscription, 42);
        assert_eq!(event.signature, "5h3k...sig");
        assert_eq!(event.logs.len(), 1);
    }

    #[test]
    fn test_parse_ignores_acks_and_garbage() {
        assert!(parse_notification(r#"{"jsonrpc":"2.0","id":1,"result":42}"#).is_none());
        assert!(parse_notification("not json").is_none());
        assert!(parse_notification(r#"{"method":"other"}"#).is_none());
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = subscribe_frame(7, "Mint111");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "logsSubscribe");
        assert_eq!(value["params"][0]["mentions"][0], "Mint111");
        assert_eq!(value["params"][1]["commitment"], "processed");
    }
}
