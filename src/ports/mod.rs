//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - Swap routing (quote/submit/status for the emergency exit)
//! - Signal sources (per-type fetchers)
//! - Settings and intent persistence
//! - Notification delivery
//! - Wallet identity and balances

pub mod mocks;
pub mod notify;
pub mod signals;
pub mod store;
pub mod swap;
pub mod wallet;

pub use notify::{Notifier, ProtectionEvent};
pub use signals::{SignalError, SignalFetcher};
pub use store::{IntentStore, SettingsStore, StoreError, StoredToken};
pub use swap::{Route, SwapError, SwapRoutingPort, TxStatus};
pub use wallet::{WalletError, WalletPort};
