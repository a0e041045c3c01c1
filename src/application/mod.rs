//! Application Layer - Use Cases and Coordination
//!
//! Wires the domain to the ports: signal aggregation, risk evaluation,
//! exit execution, scheduling, and the orchestrator that owns the
//! long-running loops.

pub mod aggregator;
pub mod executor;
pub mod monitor;
pub mod orchestrator;
pub mod rate_limit;
pub mod scheduler;
pub mod settings_manager;

pub use aggregator::SignalAggregator;
pub use executor::{ExecutorConfig, ExecutorError, ExitExecutor};
pub use monitor::{EvaluationOutcome, MonitorError, ProtectionMonitor, TokenStatus};
pub use orchestrator::ProtectionOrchestrator;
pub use rate_limit::RateLimiter;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use settings_manager::{BulkToggleResult, SettingsManager};
