//! CLI Command Definitions
//!
//! Argument parsing for the rugshield service. Command handlers live in
//! the binary entrypoint.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rugshield - Rug-Pull Protection Service for Solana Tokens
#[derive(Parser, Debug)]
#[command(
    name = "rugshield",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Rug-pull protection service for Solana tokens",
    long_about = "Rugshield continuously scores protected tokens from liquidity, \
                  dev-wallet, holder, and price signals and fires an emergency exit \
                  swap to SOL the moment risk crosses the configured threshold."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the protection service
    Run(RunCmd),

    /// Show protection status for all tracked tokens
    Status(StatusCmd),

    /// Enable protection for a token
    Protect(ProtectCmd),

    /// Disable auto-sell for a token (monitoring continues)
    Disable(DisableCmd),

    /// Stop tracking a token entirely
    Remove(RemoveCmd),

    /// Toggle auto-sell for every tracked token of a wallet
    Toggle(ToggleCmd),
}

/// Start the protection service
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mainnet.toml")]
    pub config: PathBuf,

    /// Override RPC URL
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<String>,

    /// Override keypair path
    #[arg(long, value_name = "FILE")]
    pub keypair: Option<PathBuf>,

    /// Token mints to protect at startup (repeatable)
    #[arg(long = "protect", value_name = "MINT")]
    pub protect: Vec<String>,
}

/// Show protection status
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mainnet.toml")]
    pub config: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "text")]
    pub format: String,
}

/// Enable protection for a token
#[derive(Parser, Debug)]
pub struct ProtectCmd {
    /// Token mint address
    #[arg(value_name = "MINT")]
    pub mint: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mainnet.toml")]
    pub config: PathBuf,

    /// Risk threshold that triggers the exit (LOW, MEDIUM, HIGH, CRITICAL)
    #[arg(long, value_name = "THRESHOLD", default_value = "HIGH")]
    pub risk_threshold: String,

    /// Max slippage for the exit swap, in basis points
    #[arg(long, value_name = "BPS", default_value = "500")]
    pub max_slippage: u16,

    /// Priority fee multiplier applied to the base fee
    #[arg(long, value_name = "FACTOR", default_value = "2.0")]
    pub priority_multiplier: f64,

    /// Track and score only, never sell automatically
    #[arg(long)]
    pub watch_only: bool,

    /// Subscribe to the pre-confirmation mempool stream
    #[arg(long)]
    pub mempool: bool,
}

/// Disable auto-sell for a token
#[derive(Parser, Debug)]
pub struct DisableCmd {
    /// Token mint address
    #[arg(value_name = "MINT")]
    pub mint: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mainnet.toml")]
    pub config: PathBuf,
}

/// Stop tracking a token
#[derive(Parser, Debug)]
pub struct RemoveCmd {
    /// Token mint address
    #[arg(value_name = "MINT")]
    pub mint: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mainnet.toml")]
    pub config: PathBuf,
}

/// Toggle auto-sell for every tracked token of the wallet
#[derive(Parser, Debug)]
pub struct ToggleCmd {
    /// New auto-sell state (on, off)
    #[arg(value_name = "STATE")]
    pub state: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mainnet.toml")]
    pub config: PathBuf,
}
