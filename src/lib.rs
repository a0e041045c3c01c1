//! Rugshield - Rug-Pull Protection Service Library
//!
//! Continuous risk scoring and automatic emergency exits for Solana tokens.
//!
//! # Modules
//!
//! - `domain`: Core protection logic (signals, scoring, state machine, intents)
//! - `ports`: Trait abstractions (SignalFetcher, SwapRoutingPort, stores, Notifier)
//! - `adapters`: External implementations (Jupiter, Solana, DexScreener, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Monitor, executor, scheduler, and orchestrator

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
