//! Protection Settings
//!
//! Per-(wallet, token) configuration for automatic rug-pull protection.
//! Settings are validated at the write boundary so invalid configuration
//! can never reach the evaluation loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::scorer::RiskLevel;

/// Minimum allowed priority fee multiplier
pub const MIN_PRIORITY_FEE_MULTIPLIER: f64 = 1.0;

/// Maximum allowed priority fee multiplier
pub const MAX_PRIORITY_FEE_MULTIPLIER: f64 = 5.0;

/// Maximum slippage in basis points (100%)
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("max_slippage_bps {0} out of range [0, {MAX_SLIPPAGE_BPS}]")]
    SlippageOutOfRange(u32),

    #[error("priority_fee_multiplier {0} is not a finite number")]
    InvalidMultiplier(f64),

    #[error("unknown risk threshold '{0}', expected LOW|MEDIUM|HIGH|CRITICAL")]
    UnknownThreshold(String),
}

/// Sensitivity of the auto-sell trigger. Lower thresholds fire earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskThreshold {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskThreshold {
    /// The minimum risk level at which this threshold triggers an exit.
    pub fn trigger_level(&self) -> RiskLevel {
        match self {
            RiskThreshold::Low => RiskLevel::Low,
            RiskThreshold::Medium => RiskLevel::Moderate,
            RiskThreshold::High => RiskLevel::High,
            RiskThreshold::Critical => RiskLevel::Critical,
        }
    }

    /// Parse from the wire form used by the settings surface.
    pub fn parse(s: &str) -> Result<Self, SettingsError> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskThreshold::Low),
            "MEDIUM" => Ok(RiskThreshold::Medium),
            "HIGH" => Ok(RiskThreshold::High),
            "CRITICAL" => Ok(RiskThreshold::Critical),
            other => Err(SettingsError::UnknownThreshold(other.to_string())),
        }
    }
}

/// Per-token protection configuration.
///
/// Stored as structured fields, never as an opaque blob: every write goes
/// through [`ProtectionSettings::validated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionSettings {
    /// Whether the exit engine may sell automatically on trigger
    pub auto_sell_enabled: bool,
    /// Risk level at which protection triggers
    pub risk_threshold: RiskThreshold,
    /// Whether the pre-confirmation mempool watcher is active (premium)
    pub mempool_monitoring: bool,
    /// Multiplier applied to the base network fee estimate, clamped to [1.0, 5.0]
    pub priority_fee_multiplier: f64,
    /// Maximum allowed slippage for the emergency swap, in basis points
    pub max_slippage_bps: u16,
}

impl Default for ProtectionSettings {
    fn default() -> Self {
        Self {
            auto_sell_enabled: true,
            risk_threshold: RiskThreshold::High,
            mempool_monitoring: false,
            priority_fee_multiplier: 1.5,
            max_slippage_bps: 300,
        }
    }
}

impl ProtectionSettings {
    /// Validate and normalize settings at the write boundary.
    ///
    /// The priority fee multiplier is clamped into range; an out-of-range
    /// slippage is rejected outright.
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        if !self.priority_fee_multiplier.is_finite() {
            return Err(SettingsError::InvalidMultiplier(self.priority_fee_multiplier));
        }
        self.priority_fee_multiplier = self
            .priority_fee_multiplier
            .clamp(MIN_PRIORITY_FEE_MULTIPLIER, MAX_PRIORITY_FEE_MULTIPLIER);

        if self.max_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(SettingsError::SlippageOutOfRange(self.max_slippage_bps as u32));
        }

        Ok(self)
    }

    /// Apply the multiplier to a base priority fee estimate in lamports.
    pub fn priority_fee_lamports(&self, base_fee_lamports: u64) -> u64 {
        (base_fee_lamports as f64 * self.priority_fee_multiplier).round() as u64
    }
}
