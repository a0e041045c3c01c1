//! Risk Scorer
//!
//! Pure, deterministic mapping from a [`RiskSnapshot`] to a composite 0-100
//! score, a discrete [`RiskLevel`], and the per-source factor breakdown.
//!
//! Weighted-sum model over normalized sub-scores. Liquidity collapse carries
//! half the total weight and saturates fast - liquidity removal is the
//! strongest rug signal. A confirmed honeypot is a hard override to 100.
//! Stale or missing readings score at an uncertainty floor, never at zero,
//! so an all-stale snapshot lands at MODERATE rather than looking safe.

use serde::{Deserialize, Serialize};

use crate::domain::signal::{HoneypotStatus, SignalSource, SignalValue};
use crate::domain::snapshot::{Reading, RiskSnapshot};

/// Weight of the liquidity-collapse sub-score (out of 100)
pub const WEIGHT_LIQUIDITY: u32 = 50;
/// Weight of the dev/insider sell-pressure sub-score
pub const WEIGHT_DEV_SELL: u32 = 25;
/// Weight of the holder-concentration sub-score
pub const WEIGHT_HOLDERS: u32 = 15;
/// Weight of the price-crash sub-score
pub const WEIGHT_PRICE: u32 = 10;

/// Sub-score assigned to stale or missing readings. Chosen so a snapshot
/// with nothing fresh floors at MODERATE, never MINIMAL.
pub const UNCERTAINTY_FLOOR: u32 = 45;

/// Discrete risk buckets over the 0-100 composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a composite score: MINIMAL <20, LOW <40, MODERATE <60,
    /// HIGH <80, CRITICAL >=80.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=19 => RiskLevel::Minimal,
            20..=39 => RiskLevel::Low,
            40..=59 => RiskLevel::Moderate,
            60..=79 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "No meaningful risk indicators",
            RiskLevel::Low => "Minor risk factors present",
            RiskLevel::Moderate => "Elevated or uncertain risk",
            RiskLevel::High => "Strong rug indicators",
            RiskLevel::Critical => "Rug pull in progress or imminent",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Minimal => "MINIMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// One contributing factor in a score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub source: SignalSource,
    /// Normalized 0-100 sub-score before weighting
    pub sub_score: u32,
    /// Weight applied (out of 100)
    pub weight: u32,
    /// True when the sub-score came from stale/missing data
    pub uncertain: bool,
    pub detail: String,
}

/// Result of scoring one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: u8,
    pub level: RiskLevel,
    pub factors: Vec<Factor>,
}

/// Score a snapshot. Pure function: same input, same output.
pub fn score(snapshot: &RiskSnapshot) -> ScoreBreakdown {
    // Hard override: a confirmed honeypot means the token cannot be sold
    // normally - maximum risk regardless of every other factor.
    if let Some(detail) = confirmed_honeypot(snapshot) {
        return ScoreBreakdown {
            score: 100,
            level: RiskLevel::Critical,
            factors: vec![Factor {
                source: SignalSource::DevWallet,
                sub_score: 100,
                weight: 100,
                uncertain: false,
                detail,
            }],
        };
    }

    let mut factors = Vec::with_capacity(5);
    let mut weighted_total: f64 = 0.0;

    for (source, weight) in [
        (SignalSource::Liquidity, WEIGHT_LIQUIDITY),
        (SignalSource::DevWallet, WEIGHT_DEV_SELL),
        (SignalSource::HolderDistribution, WEIGHT_HOLDERS),
        (SignalSource::Price, WEIGHT_PRICE),
    ] {
        let reading = snapshot.reading(source);
        let (sub, detail) = sub_score(source, reading);
        let uncertain = reading.is_uncertain();
        // Uncertain data is penalized to a moderate floor instead of being
        // trusted at face value or treated as safe.
        let sub = if uncertain { sub.max(UNCERTAINTY_FLOOR) } else { sub };

        weighted_total += sub as f64 * weight as f64 / 100.0;
        factors.push(Factor {
            source,
            sub_score: sub,
            weight,
            uncertain,
            detail,
        });
    }

    let mut composite = weighted_total.round().clamp(0.0, 100.0) as u8;

    // A fresh mempool anomaly short-circuits the slow factors: the composite
    // can only go up, never down.
    if let Reading::Fresh(signal) = snapshot.reading(SignalSource::MempoolAnomaly) {
        if let SignalValue::MempoolAnomaly {
            kind,
            estimated_impact_pct,
            ..
        } = &signal.value
        {
            let sub = estimated_impact_pct.clamp(0.0, 100.0) as u32;
            factors.push(Factor {
                source: SignalSource::MempoolAnomaly,
                sub_score: sub,
                weight: 100,
                uncertain: false,
                detail: format!("pending {:?} with ~{:.0}% impact", kind, estimated_impact_pct),
            });
            composite = composite.max(sub as u8);
        }
    }

    ScoreBreakdown {
        score: composite,
        level: RiskLevel::from_score(composite),
        factors,
    }
}

fn confirmed_honeypot(snapshot: &RiskSnapshot) -> Option<String> {
    let signal = snapshot.reading(SignalSource::DevWallet).signal()?;
    match signal.value {
        SignalValue::DevWallet {
            honeypot: HoneypotStatus::Confirmed,
            ..
        } => Some("sell simulation failed: confirmed honeypot".to_string()),
        _ => None,
    }
}

/// Normalized 0-100 sub-score for one source's reading, plus a human detail.
fn sub_score(source: SignalSource, reading: &Reading) -> (u32, String) {
    let Some(signal) = reading.signal() else {
        return (0, format!("{:?}: no data", source));
    };

    match &signal.value {
        SignalValue::Liquidity {
            liquidity_usd,
            change_1h_pct,
            change_24h_pct,
            lp_locked_pct,
        } => {
            // Steep penalty approaching -100% in one hour: an 80% drain
            // already saturates the sub-score.
            let drop_1h = (-change_1h_pct).max(0.0);
            let drop_24h = (-change_24h_pct).max(0.0);
            let mut sub = ((drop_1h / 80.0) * 100.0).max((drop_24h / 160.0) * 100.0);

            if *liquidity_usd < 1_000.0 {
                sub = sub.max(60.0);
            } else if *liquidity_usd < 5_000.0 {
                sub = sub.max(30.0);
            }
            if let Some(locked) = lp_locked_pct {
                if *locked < 20.0 {
                    sub = sub.max(25.0);
                }
            }

            (
                sub.clamp(0.0, 100.0) as u32,
                format!(
                    "liquidity ${:.0}, 1h {:+.1}%, 24h {:+.1}%",
                    liquidity_usd, change_1h_pct, change_24h_pct
                ),
            )
        }
        SignalValue::DevWallet { dev_sold_pct, .. } => {
            // Monotonic in dev sell pressure.
            let sub = dev_sold_pct.clamp(0.0, 100.0);
            (sub as u32, format!("dev sold {:.1}% of holdings", dev_sold_pct))
        }
        SignalValue::Holders {
            holder_count,
            top_holder_pct,
            creator_pct,
        } => {
            let concentration = top_holder_pct.max(*creator_pct);
            let mut sub = ((concentration - 20.0) / 60.0 * 100.0).clamp(0.0, 100.0);
            if *holder_count < 10 {
                sub = sub.max(50.0);
            }
            (
                sub as u32,
                format!(
                    "{} holders, top {:.1}%, creator {:.1}%",
                    holder_count, top_holder_pct, creator_pct
                ),
            )
        }
        SignalValue::Price {
            price_usd,
            change_24h_pct,
        } => {
            let drop = (-change_24h_pct).max(0.0);
            let sub = ((drop / 60.0) * 100.0).clamp(0.0, 100.0);
            (
                sub as u32,
                format!("price ${:.6}, 24h {:+.1}%", price_usd, change_24h_pct),
            )
        }
        SignalValue::MempoolAnomaly { .. } => (0, "handled separately".to_string()),
    }
}
