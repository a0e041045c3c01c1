//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Swap: Jupiter aggregator routing and submission
//! - Wallet: Solana keypair and token balances
//! - Signals: DexScreener, rug-report, and on-chain holder fetchers
//! - Mempool: pre-confirmation websocket anomaly stream
//! - Store: settings and intent persistence
//! - Notify: webhook and log event delivery
//! - CLI: command-line interface

pub mod cli;
pub mod mempool;
pub mod notify;
pub mod signals;
pub mod store;
pub mod swap;
pub mod wallet;

pub use cli::CliApp;
pub use mempool::{MempoolConfig, MempoolWatcher};
pub use notify::{LogNotifier, WebhookConfig, WebhookNotifier};
pub use signals::{
    DevWalletFetcher, DexScreenerConfig, HolderFetcher, LiquidityFetcher, PriceFetcher,
    RugReportConfig,
};
pub use store::{InMemoryIntentStore, InMemorySettingsStore};
pub use swap::{JupiterConfig, JupiterRouter};
pub use wallet::SolanaWallet;
