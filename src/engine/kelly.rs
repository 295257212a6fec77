//! Kelly Criterion stake sizing.
//!
//! The Kelly formula sizes a bet to maximise the expected logarithm of wealth:
//!
//!   f* = (b·p − q) / b
//!
//! where
//!   b = net decimal odds (profit per unit staked, i.e. odds − 1)
//!   p = estimated probability of winning
//!   q = 1 − p
//!
//! A *fractional* multiplier (default 25%) trades some expected growth for
//! much lower variance, and the result is clamped to a bankroll percentage.

use serde::{Deserialize, Serialize};

use crate::error::{check_probability, check_stake, EngineError, Result};
use crate::models::{KellyAdvice, KellyResult, Odds, RiskLevel, StakeAssessment, StakeVerdict};

pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;
pub const DEFAULT_MAX_STAKE_PCT: f64 = 0.05;
pub const DEFAULT_MIN_STAKE: f64 = 1.0;

/// Flat 1% of bankroll, reported alongside the Kelly stake.
pub const CONSERVATIVE_STAKE_PCT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Fractional Kelly multiplier (0, 1]
    pub kelly_fraction: f64,
    /// Upper bound on any stake, as a fraction of bankroll
    pub max_stake_pct: f64,
    /// Smallest stake worth placing, in currency units
    pub min_stake: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        StakingConfig {
            kelly_fraction: DEFAULT_KELLY_FRACTION,
            max_stake_pct: DEFAULT_MAX_STAKE_PCT,
            min_stake: DEFAULT_MIN_STAKE,
        }
    }
}

impl StakingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            return Err(EngineError::InvalidConfig {
                field: "kelly_fraction",
                reason: format!("{} is outside (0, 1]", self.kelly_fraction),
            });
        }
        if !(self.max_stake_pct > 0.0 && self.max_stake_pct <= 1.0) {
            return Err(EngineError::InvalidConfig {
                field: "max_stake_pct",
                reason: format!("{} is outside (0, 1]", self.max_stake_pct),
            });
        }
        if !self.min_stake.is_finite() || self.min_stake < 0.0 {
            return Err(EngineError::InvalidConfig {
                field: "min_stake",
                reason: format!("{} must be a non-negative amount", self.min_stake),
            });
        }
        Ok(())
    }
}

/// Full Kelly fraction for decimal `odds` and win probability `p`.
/// Negative when the bet has no edge.
pub fn kelly_fraction(odds: Odds, p: f64) -> f64 {
    let b = odds.net();
    let q = 1.0 - p;
    (b * p - q) / b
}

fn advice(full_kelly: f64) -> KellyAdvice {
    if full_kelly > 0.2 {
        KellyAdvice::HighEdge
    } else if full_kelly > 0.1 {
        KellyAdvice::GoodEdge
    } else if full_kelly > 0.0 {
        KellyAdvice::SmallEdge
    } else {
        KellyAdvice::NoEdge
    }
}

/// Size a stake with fractional Kelly.
///
/// The recommended stake is `bankroll · f* · kelly_fraction` clamped to
/// `[min_stake, max_stake_pct · bankroll]`; when the cap is below the
/// minimum the cap wins. No edge means a stake of exactly 0.
pub fn kelly(bankroll: f64, odds: f64, p: f64, config: &StakingConfig) -> Result<KellyResult> {
    config.validate()?;
    let bankroll = check_stake(bankroll)?;
    let odds = Odds::new(odds)?;
    let p = check_probability(p)?;

    let full_kelly = kelly_fraction(odds, p);
    let max_stake = bankroll * config.max_stake_pct;

    if full_kelly <= 0.0 {
        return Ok(KellyResult {
            bankroll,
            full_kelly,
            fractional_kelly: 0.0,
            full_kelly_stake: 0.0,
            recommended_stake: 0.0,
            max_stake,
            conservative_stake: 0.0,
            advice: KellyAdvice::NoEdge,
        });
    }

    let fractional_kelly = full_kelly * config.kelly_fraction;
    let recommended_stake = (bankroll * fractional_kelly)
        .max(config.min_stake)
        .min(max_stake);

    Ok(KellyResult {
        bankroll,
        full_kelly,
        fractional_kelly,
        full_kelly_stake: bankroll * full_kelly,
        recommended_stake,
        max_stake,
        conservative_stake: (bankroll * CONSERVATIVE_STAKE_PCT).min(max_stake),
        advice: advice(full_kelly),
    })
}

/// Risk band for a stake expressed as a percentage of bankroll.
pub fn risk_level(stake_percentage: f64) -> RiskLevel {
    if stake_percentage <= 1.0 {
        RiskLevel::VeryLow
    } else if stake_percentage <= 2.0 {
        RiskLevel::Low
    } else if stake_percentage <= 5.0 {
        RiskLevel::Moderate
    } else if stake_percentage <= 10.0 {
        RiskLevel::High
    } else {
        RiskLevel::VeryHigh
    }
}

/// Rate a proposed stake against the bankroll and the fractional-Kelly optimum.
pub fn assess_stake(
    stake: f64,
    bankroll: f64,
    odds: f64,
    p: f64,
    config: &StakingConfig,
) -> Result<StakeAssessment> {
    let stake = check_stake(stake)?;
    let result = kelly(bankroll, odds, p, config)?;

    let stake_percentage = stake / result.bankroll * 100.0;
    let kelly_percentage = result.full_kelly.max(0.0) * 100.0;
    let kelly_optimal_stake = result.bankroll * result.fractional_kelly;

    let verdict = if stake_percentage > 10.0 || stake > 2.0 * kelly_optimal_stake {
        StakeVerdict::ReduceStake
    } else if kelly_optimal_stake > 0.0 && stake < 0.5 * kelly_optimal_stake {
        StakeVerdict::IncreaseStake
    } else {
        StakeVerdict::Optimal
    };

    Ok(StakeAssessment {
        stake,
        bankroll: result.bankroll,
        stake_percentage,
        kelly_percentage,
        kelly_optimal_stake,
        risk_level: risk_level(stake_percentage),
        verdict,
    })
}
