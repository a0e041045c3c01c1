//! Rugshield - Rug-Pull Protection Service for Solana Tokens
//!
//! Continuously scores protected tokens from liquidity, dev-wallet, holder,
//! and price signals and fires an emergency exit swap to SOL the moment risk
//! crosses the configured threshold.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use solana_client::nonblocking::rpc_client::RpcClient;
use tracing_subscriber::{fmt, EnvFilter};

use rugshield::adapters::cli::{
    CliApp, Command, DisableCmd, ProtectCmd, RemoveCmd, RunCmd, StatusCmd, ToggleCmd,
};
use rugshield::adapters::mempool::{MempoolConfig, MempoolWatcher};
use rugshield::adapters::notify::{LogNotifier, WebhookConfig, WebhookNotifier};
use rugshield::adapters::signals::{
    DevWalletFetcher, DexScreenerConfig, HolderFetcher, LiquidityFetcher, PriceFetcher,
    RugReportConfig,
};
use rugshield::adapters::store::{FileSettingsStore, InMemoryIntentStore};
use rugshield::adapters::swap::{JupiterConfig, JupiterRouter};
use rugshield::adapters::wallet::SolanaWallet;
use rugshield::application::aggregator::SignalAggregator;
use rugshield::application::executor::{ExecutorConfig, ExitExecutor};
use rugshield::application::monitor::ProtectionMonitor;
use rugshield::application::orchestrator::ProtectionOrchestrator;
use rugshield::application::rate_limit::RateLimiter;
use rugshield::application::scheduler::{Scheduler, SchedulerConfig};
use rugshield::application::settings_manager::SettingsManager;
use rugshield::config::{load_config, Config};
use rugshield::domain::settings::{ProtectionSettings, RiskThreshold};
use rugshield::domain::token::TokenKey;
use rugshield::ports::notify::Notifier;
use rugshield::ports::signals::SignalFetcher;
use rugshield::ports::wallet::WalletPort;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Status(cmd) => status_command(cmd).await,
        Command::Protect(cmd) => protect_command(cmd).await,
        Command::Disable(cmd) => disable_command(cmd).await,
        Command::Remove(cmd) => remove_command(cmd).await,
        Command::Toggle(cmd) => toggle_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt().with_env_filter(filter).init();
}

/// Wired service components shared by the command handlers.
struct Service {
    monitor: Arc<ProtectionMonitor>,
    settings: Arc<SettingsManager>,
    scheduler: Arc<Scheduler>,
    mempool: Option<Arc<MempoolWatcher>>,
    wallet_address: String,
}

fn build_service(
    config: &Config,
    rpc_url_override: Option<&str>,
    keypair_override: Option<&str>,
) -> Result<Service> {
    let rpc_url = rpc_url_override
        .map(str::to_string)
        .unwrap_or_else(|| config.solana.get_rpc_url());
    let keypair_path = keypair_override
        .map(str::to_string)
        .unwrap_or_else(|| config.solana.get_keypair_path());

    let rpc = Arc::new(RpcClient::new(rpc_url));
    let wallet = Arc::new(
        SolanaWallet::from_file(&keypair_path, rpc.clone())
            .with_context(|| format!("Failed to load wallet from '{keypair_path}'"))?,
    );
    let wallet_address = wallet.address();

    let limiter = RateLimiter::new(
        config.limits.requests_burst,
        config.limits.requests_per_second,
    );

    let router = Arc::new(
        JupiterRouter::new(JupiterConfig::from(config), rpc.clone(), wallet.clone())
            .context("Failed to create swap router")?,
    );
    let intents = Arc::new(InMemoryIntentStore::new());
    let executor = Arc::new(ExitExecutor::new(
        router,
        intents.clone(),
        limiter.clone(),
        ExecutorConfig::from(config),
    ));

    let dexscreener = DexScreenerConfig::from(config);
    let fetchers: Vec<Arc<dyn SignalFetcher>> = vec![
        Arc::new(
            LiquidityFetcher::new(dexscreener.clone()).context("Failed to create liquidity fetcher")?,
        ),
        Arc::new(PriceFetcher::new(dexscreener).context("Failed to create price fetcher")?),
        Arc::new(HolderFetcher::new(rpc)),
        Arc::new(
            DevWalletFetcher::new(RugReportConfig::from(config))
                .context("Failed to create dev-wallet fetcher")?,
        ),
    ];

    let notifier: Arc<dyn Notifier> = if config.alerts.webhook_enabled {
        Arc::new(
            WebhookNotifier::new(WebhookConfig::from(config))
                .context("Failed to create webhook notifier")?,
        )
    } else {
        Arc::new(LogNotifier)
    };

    // Settings live in a shared JSON file so one-shot commands and the run
    // loop see the same records.
    let store_path = shellexpand::tilde(&config.storage.path).to_string();
    let settings_store = Arc::new(
        FileSettingsStore::open(&store_path)
            .with_context(|| format!("Failed to open protection store '{store_path}'"))?,
    );
    let settings = Arc::new(SettingsManager::new(settings_store));
    let monitor = Arc::new(ProtectionMonitor::new(
        settings.clone(),
        fetchers,
        Arc::new(SignalAggregator::new()),
        executor,
        intents,
        notifier,
        wallet,
        limiter,
    ));

    let scheduler = Arc::new(Scheduler::new(monitor.clone(), SchedulerConfig::from(config)));
    let mempool = if config.mempool.enabled {
        Some(Arc::new(MempoolWatcher::new(
            MempoolConfig::from(config),
            monitor.clone(),
            scheduler.preempt_sender(),
        )))
    } else {
        None
    };

    Ok(Service {
        monitor,
        settings,
        scheduler,
        mempool,
        wallet_address,
    })
}

/// Register every stored token of the service wallet with the monitor.
/// Lifecycle state is process-local; stored records resume monitoring with
/// their persisted settings (watch-only when auto-sell is off).
async fn seed_tracked_tokens(service: &Service) -> Result<usize> {
    let stored = service.settings.list_tokens(&service.wallet_address).await?;
    let count = stored.len();
    for token in stored {
        let key = TokenKey::new(service.wallet_address.clone(), token.mint.clone());
        service
            .monitor
            .enable(key, token.settings)
            .await
            .with_context(|| format!("Failed to resume protection for {}", token.mint))?;
    }
    Ok(count)
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("Starting rugshield protection service...");

    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let service = build_service(
        &config,
        cmd.rpc_url.as_deref(),
        cmd.keypair.as_deref().and_then(|p| p.to_str()),
    )?;

    let resumed = seed_tracked_tokens(&service).await?;
    if resumed > 0 {
        tracing::info!(resumed, "resumed protection for stored tokens");
    }

    let defaults = config.default_protection_settings()?;
    for mint in &cmd.protect {
        let key = TokenKey::new(service.wallet_address.clone(), mint.clone());
        service
            .monitor
            .enable(key, defaults.clone())
            .await
            .with_context(|| format!("Failed to enable protection for {mint}"))?;
        tracing::info!(mint, "protection enabled");
    }

    let orchestrator = Arc::new(ProtectionOrchestrator::new(
        service.monitor,
        service.scheduler,
        service.mempool,
    ));

    let orch = orchestrator.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        orch.stop();
    });

    orchestrator.run().await;
    tracing::info!("Rugshield stopped");
    Ok(())
}

async fn status_command(cmd: StatusCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let service = build_service(&config, None, None)?;
    seed_tracked_tokens(&service).await?;

    let status = service.monitor.status().await;
    match cmd.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        _ => {
            println!("Wallet: {}", service.wallet_address);
            if status.is_empty() {
                println!("No tokens under protection.");
            }
            for token in &status {
                println!(
                    "  {}  state={:?}  auto_sell={}  score={}",
                    token.key.mint,
                    token.state,
                    token.auto_sell_enabled,
                    token
                        .last_risk_score
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
    }

    Ok(())
}

async fn protect_command(cmd: ProtectCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let service = build_service(&config, None, None)?;

    let settings = ProtectionSettings {
        auto_sell_enabled: !cmd.watch_only,
        risk_threshold: RiskThreshold::parse(&cmd.risk_threshold)
            .context("Invalid risk threshold")?,
        mempool_monitoring: cmd.mempool,
        priority_fee_multiplier: cmd.priority_multiplier,
        max_slippage_bps: cmd.max_slippage,
    };

    let key = TokenKey::new(service.wallet_address.clone(), cmd.mint.clone());
    service
        .monitor
        .enable(key, settings)
        .await
        .with_context(|| format!("Failed to enable protection for {}", cmd.mint))?;

    println!("Protection enabled for {}", cmd.mint);
    println!("  Wallet: {}", service.wallet_address);
    println!("  Threshold: {}", cmd.risk_threshold.to_uppercase());
    println!(
        "  Auto-sell: {}",
        if cmd.watch_only { "off (watch only)" } else { "on" }
    );
    Ok(())
}

async fn disable_command(cmd: DisableCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let service = build_service(&config, None, None)?;

    let key = TokenKey::new(service.wallet_address.clone(), cmd.mint.clone());
    service
        .monitor
        .disable(&key)
        .await
        .with_context(|| format!("Failed to disable auto-sell for {}", cmd.mint))?;

    println!("Protection disabled for {} (auto-sell off)", cmd.mint);
    Ok(())
}

async fn remove_command(cmd: RemoveCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let service = build_service(&config, None, None)?;

    let key = TokenKey::new(service.wallet_address.clone(), cmd.mint.clone());
    service
        .monitor
        .remove(&key)
        .await
        .with_context(|| format!("Failed to remove {}", cmd.mint))?;

    println!("Stopped tracking {}", cmd.mint);
    Ok(())
}

async fn toggle_command(cmd: ToggleCmd) -> Result<()> {
    let enabled = match cmd.state.as_str() {
        "on" => true,
        "off" => false,
        other => anyhow::bail!("Unknown toggle state '{other}', expected 'on' or 'off'"),
    };

    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let service = build_service(&config, None, None)?;

    let result = service
        .monitor
        .bulk_set_enabled(&service.wallet_address, enabled)
        .await
        .context("Bulk toggle failed")?;

    println!(
        "Auto-sell {} for wallet {}",
        if enabled { "enabled" } else { "disabled" },
        service.wallet_address
    );
    println!(
        "  Affected: {} (created {}, updated {})",
        result.tokens_affected, result.tokens_created, result.tokens_updated
    );
    for failure in &result.failed {
        println!("  Failed: {} ({})", failure.mint, failure.reason);
    }
    Ok(())
}
