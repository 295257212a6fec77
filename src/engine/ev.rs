//! Expected value of a single bet.
//!
//!   EV    = p·(odds − 1)·stake − (1 − p)·stake
//!   edge% = (p − implied) / implied · 100
//!
//! where `implied = 1/odds` is the bookmaker's (margin-inclusive) probability.
//! EV is positive exactly when `p > implied`.

use serde::{Deserialize, Serialize};

use crate::error::{check_probability, check_stake, Result};
use crate::models::{EVResult, Odds, RecommendationTier};

/// EV-percentage cut-offs for the recommendation tier. Each tier requires
/// the EV percentage to be strictly above its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for EvThresholds {
    fn default() -> Self {
        EvThresholds {
            excellent: 8.0,
            good: 5.0,
            fair: 0.0,
            poor: -5.0,
        }
    }
}

impl EvThresholds {
    pub fn tier(&self, ev_percentage: f64) -> RecommendationTier {
        if ev_percentage > self.excellent {
            RecommendationTier::Excellent
        } else if ev_percentage > self.good {
            RecommendationTier::Good
        } else if ev_percentage > self.fair {
            RecommendationTier::Fair
        } else if ev_percentage > self.poor {
            RecommendationTier::Poor
        } else {
            RecommendationTier::NoValue
        }
    }
}

/// Odds at which a bet with win probability `p` breaks even.
pub fn fair_odds(p: f64) -> Result<f64> {
    Ok(1.0 / check_probability(p)?)
}

/// Relative edge `p / implied − 1`; positive when the price is too long.
pub fn edge(p: f64, odds: f64) -> Result<f64> {
    let p = check_probability(p)?;
    let odds = Odds::new(odds)?;
    Ok(p * odds.decimal() - 1.0)
}

pub fn calculate_ev(stake: f64, odds: f64, p: f64, thresholds: &EvThresholds) -> Result<EVResult> {
    let stake = check_stake(stake)?;
    let odds = Odds::new(odds)?;
    let p = check_probability(p)?;

    let implied = odds.implied_probability();
    let expected_value = p * odds.net() * stake - (1.0 - p) * stake;
    let ev_percentage = expected_value / stake * 100.0;

    Ok(EVResult {
        expected_value,
        ev_percentage,
        is_positive_ev: expected_value > 0.0,
        true_probability: p,
        implied_probability: implied,
        edge_percentage: (p - implied) / implied * 100.0,
        value_gap: p - implied,
        fair_odds: 1.0 / p,
        tier: thresholds.tier(ev_percentage),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use approx::assert_relative_eq;

    #[test]
    fn positive_ev_example() {
        // 55% at 2.10: EV = 0.55·1.10·100 − 0.45·100 = 15.5
        let r = calculate_ev(100.0, 2.10, 0.55, &EvThresholds::default()).unwrap();
        assert_relative_eq!(r.expected_value, 15.5, epsilon = 1e-9);
        assert_relative_eq!(r.ev_percentage, 15.5, epsilon = 1e-9);
        assert_relative_eq!(r.fair_odds, 1.0 / 0.55, epsilon = 1e-12);
        assert_relative_eq!(r.edge_percentage, 15.5, epsilon = 1e-9);
        assert!(r.is_positive_ev);
        assert_eq!(r.tier, RecommendationTier::Excellent);
    }

    #[test]
    fn ev_sign_matches_probability_versus_implied() {
        for odds in [1.2, 1.5, 2.0, 2.75, 4.0, 10.0] {
            for i in 1..=100 {
                let p = i as f64 / 100.0;
                let r = calculate_ev(10.0, odds, p, &EvThresholds::default()).unwrap();
                if (p - 1.0 / odds).abs() < 1e-12 {
                    continue;
                }
                assert_eq!(r.is_positive_ev, p > 1.0 / odds, "odds {} p {}", odds, p);
            }
        }
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = EvThresholds::default();
        assert_eq!(t.tier(9.0), RecommendationTier::Excellent);
        assert_eq!(t.tier(8.0), RecommendationTier::Good);
        assert_eq!(t.tier(3.0), RecommendationTier::Fair);
        assert_eq!(t.tier(0.0), RecommendationTier::Poor);
        assert_eq!(t.tier(-5.0), RecommendationTier::NoValue);
    }

    #[test]
    fn rejects_bad_inputs() {
        let t = EvThresholds::default();
        assert!(matches!(
            calculate_ev(10.0, 2.0, 0.0, &t),
            Err(EngineError::InvalidProbability { .. })
        ));
        assert!(matches!(
            calculate_ev(10.0, 2.0, 1.2, &t),
            Err(EngineError::InvalidProbability { .. })
        ));
        assert!(matches!(
            calculate_ev(0.0, 2.0, 0.5, &t),
            Err(EngineError::InvalidStake { .. })
        ));
        assert!(matches!(
            calculate_ev(10.0, 1.0, 0.5, &t),
            Err(EngineError::InvalidOdds { .. })
        ));
    }

    #[test]
    fn edge_and_fair_odds() {
        assert_relative_eq!(edge(0.6, 2.0).unwrap(), 0.2, epsilon = 1e-9);
        assert!(edge(0.3, 2.0).unwrap() < 0.0);
        assert_relative_eq!(fair_odds(0.25).unwrap(), 4.0, epsilon = 1e-12);
        assert!(fair_odds(0.0).is_err());
    }
}
