//! Protection Service Integration Tests
//!
//! Verifies that the protection components work together end to end:
//! 1. Signal fetchers -> aggregator -> scorer -> trigger -> exit execution
//! 2. Scheduler sweeps and mempool preemption
//! 3. Settings semantics (disable, bulk toggle) against the exit engine
//!
//! All tests are deterministic (no real network calls) and use mock ports.

use std::sync::Arc;
use std::time::Duration;

use rugshield::adapters::store::{InMemoryIntentStore, InMemorySettingsStore};
use rugshield::application::aggregator::SignalAggregator;
use rugshield::application::executor::{ExecutorConfig, ExitExecutor};
use rugshield::application::monitor::{EvaluationOutcome, ProtectionMonitor};
use rugshield::application::rate_limit::RateLimiter;
use rugshield::application::scheduler::{Scheduler, SchedulerConfig};
use rugshield::application::settings_manager::SettingsManager;
use rugshield::domain::settings::ProtectionSettings;
use rugshield::domain::signal::{
    AnomalyKind, HoneypotStatus, RiskSignal, SignalSource, SignalValue,
};
use rugshield::domain::token::{ProtectionState, TokenKey};
use rugshield::ports::mocks::{MockNotifier, MockSignalFetcher, MockSwapRouter, MockWallet};
use rugshield::ports::notify::ProtectionEvent;
use rugshield::ports::signals::SignalFetcher;
use rugshield::ports::store::IntentStore;
use rugshield::ports::swap::{SwapError, TxStatus};

// ============================================================================
// Test Fixtures
// ============================================================================

struct Stack {
    monitor: Arc<ProtectionMonitor>,
    settings: Arc<SettingsManager>,
    settings_store: Arc<InMemorySettingsStore>,
    intents: Arc<InMemoryIntentStore>,
    router: Arc<MockSwapRouter>,
    liquidity: Arc<MockSignalFetcher>,
    dev_wallet: Arc<MockSignalFetcher>,
    notifier: Arc<MockNotifier>,
    wallet: Arc<MockWallet>,
}

fn build_stack() -> Stack {
    let settings_store = Arc::new(InMemorySettingsStore::new());
    let settings = Arc::new(SettingsManager::new(settings_store.clone()));
    let intents: Arc<InMemoryIntentStore> = Arc::new(InMemoryIntentStore::new());
    let router = Arc::new(MockSwapRouter::new());
    let notifier = Arc::new(MockNotifier::new());
    let wallet = Arc::new(MockWallet::new("Wallet111"));
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
        settings.clone(),
        fetchers,
        Arc::new(SignalAggregator::new()),
        executor,
        intents.clone(),
        notifier.clone(),
        wallet.clone(),
        limiter,
    ));

    Stack {
        monitor,
        settings,
        settings_store,
        intents,
        router,
        liquidity,
        dev_wallet,
        notifier,
        wallet,
    }
}

fn key(mint: &str) -> TokenKey {
    TokenKey::new("Wallet111", mint)
}

/// Liquidity collapse plus heavy dev selling: scores CRITICAL.
fn rug_signals(stack: &Stack, mint: &str) {
    stack.liquidity.push(Ok(RiskSignal::new(
        mint,
        SignalValue::Liquidity {
            liquidity_usd: 2_000.0,
            change_1h_pct: -95.0,
            change_24h_pct: -95.0,
            lp_locked_pct: Some(10.0),
        },
    )));
    stack.dev_wallet.push(Ok(RiskSignal::new(
        mint,
        SignalValue::DevWallet {
            dev_sold_pct: 80.0,
            honeypot: HoneypotStatus::Sellable,
        },
    )));
}

fn calm_signals(stack: &Stack, mint: &str) {
    stack.liquidity.push(Ok(RiskSignal::new(
        mint,
        SignalValue::Liquidity {
            liquidity_usd: 250_000.0,
            change_1h_pct: 0.5,
            change_24h_pct: 2.0,
            lp_locked_pct: Some(95.0),
        },
    )));
    stack.dev_wallet.push(Ok(RiskSignal::new(
        mint,
        SignalValue::DevWallet {
            dev_sold_pct: 0.0,
            honeypot: HoneypotStatus::Sellable,
        },
    )));
}

// ============================================================================
// End-to-end trigger flow
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rug_pull_detected_and_exited_once() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();
    rug_signals(&stack, "Mint111");

    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));
    assert_eq!(stack.router.submission_count(), 1);

    // The exit is recorded, the token is terminal, and nothing fires twice.
    let live = stack.intents.active_intent(&key("Mint111")).await.unwrap();
    assert!(live.is_none(), "confirmed intent must not stay active");
    assert_eq!(stack.intents.intent_count().await, 1);

    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert_eq!(
        outcome,
        EvaluationOutcome::NotEvaluable(ProtectionState::Exited)
    );
    assert_eq!(stack.router.submission_count(), 1);

    // Notifications arrived in order: Triggered then Exited.
    let events = stack.notifier.events();
    assert!(matches!(events[0].1, ProtectionEvent::Triggered { .. }));
    assert!(matches!(events[1].1, ProtectionEvent::Exited { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_one_rug_does_not_disturb_other_tokens() {
    let stack = build_stack();
    stack.wallet.set_balance("MintA", 500_000);
    stack.wallet.set_balance("MintB", 500_000);
    for mint in ["MintA", "MintB"] {
        stack
            .monitor
            .enable(key(mint), ProtectionSettings::default())
            .await
            .unwrap();
    }

    // MintA rugs; MintB stays calm. Fetcher queues are per-source FIFO, so
    // evaluate MintA first.
    rug_signals(&stack, "MintA");
    let outcome = stack.monitor.evaluate(&key("MintA")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));

    calm_signals(&stack, "MintB");
    let outcome = stack.monitor.evaluate(&key("MintB")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Scored { .. }));

    assert_eq!(stack.router.submission_count(), 1);
    assert_eq!(stack.router.submissions()[0].0, "MintA");

    let status = stack.monitor.status().await;
    assert_eq!(status[0].state, ProtectionState::Exited); // MintA
    assert_eq!(status[1].state, ProtectionState::Monitoring); // MintB
}

// ============================================================================
// Retry and idempotency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retry_without_duplicate_exit() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();

    // Two transient submit failures before the accepted one.
    stack
        .router
        .push_submit(Err(SwapError::Transport("connection reset".into())));
    stack
        .router
        .push_submit(Err(SwapError::RateLimited("429".into())));

    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    let intent_id = match outcome {
        EvaluationOutcome::Exited { intent_id, .. } => intent_id,
        other => panic!("expected exit, got {other:?}"),
    };

    assert_eq!(stack.router.submission_count(), 1);
    let stored = stack.intents.get(&intent_id).await.unwrap().unwrap();
    assert_eq!(stored.attempt_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_swap_error_returns_token_to_monitoring() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();
    stack
        .router
        .push_quote(Err(SwapError::RouteUnavailable("Mint111".into())));

    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::ExitFailed { .. }));
    assert_eq!(stack.router.submission_count(), 0);

    // Back to monitoring: a later cycle may try again with a fresh intent.
    let status = stack.monitor.status().await;
    assert_eq!(status[0].state, ProtectionState::Monitoring);

    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));
    assert_eq!(stack.intents.intent_count().await, 2);
}

// ============================================================================
// Settings semantics
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_watch_only_protection_scores_without_exit() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(
            key("Mint111"),
            ProtectionSettings {
                auto_sell_enabled: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    match outcome {
        EvaluationOutcome::Scored { score, .. } => assert!(score >= 80),
        other => panic!("expected scored outcome, got {other:?}"),
    }
    assert_eq!(stack.router.submission_count(), 0);
    assert_eq!(stack.intents.intent_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_disable_parks_token_and_reenable_resumes() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();
    stack.monitor.disable(&key("Mint111")).await.unwrap();

    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert_eq!(
        outcome,
        EvaluationOutcome::NotEvaluable(ProtectionState::Inactive)
    );
    assert_eq!(stack.router.submission_count(), 0);

    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();
    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_execution_never_aborts_live_exit() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();

    // Confirmation stays pending long enough for the disable to land while
    // the exit is executing.
    stack.router.push_status(Ok(TxStatus::Pending));
    stack.router.push_status(Ok(TxStatus::Pending));
    stack.router.push_status(Ok(TxStatus::Confirmed));
    rug_signals(&stack, "Mint111");

    let eval = tokio::spawn({
        let monitor = stack.monitor.clone();
        async move { monitor.evaluate(&key("Mint111")).await }
    });

    // The exit holds the token lock across its confirmation polls; the
    // disable flips the stored settings but cannot touch the live intent.
    tokio::time::sleep(Duration::from_millis(100)).await;
    stack.monitor.disable(&key("Mint111")).await.unwrap();

    let outcome = eval.await.unwrap().unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Exited { .. }));
    assert_eq!(stack.router.submission_count(), 1);

    let status = stack.monitor.status().await;
    assert_eq!(status[0].state, ProtectionState::Exited);
    assert!(!stack
        .settings
        .get(&key("Mint111"))
        .await
        .unwrap()
        .unwrap()
        .auto_sell_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_failed_execution_blocks_new_intent() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();

    stack.router.push_status(Ok(TxStatus::Pending));
    stack.router.push_status(Ok(TxStatus::Failed));
    rug_signals(&stack, "Mint111");

    let eval = tokio::spawn({
        let monitor = stack.monitor.clone();
        async move { monitor.evaluate(&key("Mint111")).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    stack.monitor.disable(&key("Mint111")).await.unwrap();

    let outcome = eval.await.unwrap().unwrap();
    assert!(matches!(outcome, EvaluationOutcome::ExitFailed { .. }));
    assert_eq!(stack.intents.intent_count().await, 1);

    // The failed exit put the token back to monitoring, but the disabled
    // settings stop any new intent on the next cycle.
    rug_signals(&stack, "Mint111");
    let outcome = stack.monitor.evaluate(&key("Mint111")).await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Scored { .. }));
    assert_eq!(stack.intents.intent_count().await, 1);
    assert_eq!(stack.router.submission_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bulk_toggle_reports_itemized_failures() {
    let stack = build_stack();
    for i in 0..10 {
        stack
            .monitor
            .enable(key(&format!("Mint{i:02}")), ProtectionSettings::default())
            .await
            .unwrap();
    }
    // Two tokens whose store writes will fail.
    stack.settings_store.fail_upsert_for("Mint03").await;
    stack.settings_store.fail_upsert_for("Mint07").await;

    let result = stack
        .monitor
        .bulk_set_enabled("Wallet111", false)
        .await
        .unwrap();

    assert_eq!(result.tokens_affected, 8);
    assert_eq!(result.failed.len(), 2);
    let failed_mints: Vec<&str> = result.failed.iter().map(|f| f.mint.as_str()).collect();
    assert!(failed_mints.contains(&"Mint03"));
    assert!(failed_mints.contains(&"Mint07"));

    // Affected tokens are parked; the two failed ones keep monitoring.
    for status in stack.monitor.status().await {
        if failed_mints.contains(&status.key.mint.as_str()) {
            assert_eq!(status.state, ProtectionState::Monitoring);
        } else {
            assert_eq!(status.state, ProtectionState::Inactive);
            assert!(!status.auto_sell_enabled);
        }
    }

    // The wallet-level default flipped regardless of per-token failures.
    assert!(!stack
        .settings_store
        .wallet_default("Wallet111")
        .await
        .unwrap()
        .auto_sell_enabled);
}

// ============================================================================
// Scheduler and preemption
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_sweep_drives_exit() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();
    rug_signals(&stack, "Mint111");

    let scheduler = Arc::new(Scheduler::new(
        stack.monitor.clone(),
        SchedulerConfig {
            workers: 2,
            evaluation_interval: Duration::from_secs(1),
        },
    ));
    let run = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    scheduler.stop();
    run.await.unwrap();

    assert_eq!(stack.router.submission_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mempool_preemption_exits_before_next_sweep() {
    let stack = build_stack();
    stack.wallet.set_balance("Mint111", 1_000_000);
    stack
        .monitor
        .enable(key("Mint111"), ProtectionSettings::default())
        .await
        .unwrap();

    // The next sweep is an hour away; only the preemption path can fire.
    let scheduler = Arc::new(Scheduler::new(
        stack.monitor.clone(),
        SchedulerConfig {
            workers: 1,
            evaluation_interval: Duration::from_secs(3_600),
        },
    ));
    let run = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    // What the mempool watcher does on a classified anomaly: ingest the
    // signal and ping the preemption queue.
    stack
        .monitor
        .ingest_signal(RiskSignal::new(
            "Mint111",
            SignalValue::MempoolAnomaly {
                kind: AnomalyKind::LiquidityRemoval,
                estimated_impact_pct: 95.0,
                pending_signature: Some("pending_rug_sig".to_string()),
            },
        ))
        .await;
    scheduler.preempt_sender().send(key("Mint111")).await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    scheduler.stop();
    run.await.unwrap();

    assert_eq!(stack.router.submission_count(), 1);
    let status = stack.monitor.status().await;
    assert_eq!(status[0].state, ProtectionState::Exited);
}
