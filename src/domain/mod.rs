//! Domain Layer - Core protection logic
//!
//! Pure types and decision logic with no external dependencies. All I/O
//! happens through the ports layer.
//!
//! - `settings`: per-token protection configuration, validated at write time
//! - `signal`: immutable observations from source adapters
//! - `snapshot`: latest-per-source view with explicit staleness
//! - `scorer`: deterministic snapshot -> score/level mapping
//! - `token`: protected token identity and state machine
//! - `intent`: emergency-exit attempt chain with idempotency

pub mod intent;
pub mod scorer;
pub mod settings;
pub mod signal;
pub mod snapshot;
pub mod token;

pub use intent::{ExitIntent, IntentError, IntentStatus, TriggerReason};
pub use scorer::{score, Factor, RiskLevel, ScoreBreakdown};
pub use settings::{ProtectionSettings, RiskThreshold, SettingsError};
pub use signal::{AnomalyKind, HoneypotStatus, RiskSignal, SignalSource, SignalValue};
pub use snapshot::{Reading, RiskSnapshot};
pub use token::{ProtectedToken, ProtectionState, StateError, TokenKey};
