//! Rule-based draw calibration.
//!
//! An independent-Poisson model underrates draws between evenly matched,
//! low-scoring sides. Six match signals are scored; a high score pins the
//! draw probability to a high level and a low score to a low one. Home and
//! away keep their relative shares of what remains.
//!
//! | condition                          | default | points |
//! |------------------------------------|---------|--------|
//! | expected-goals gap below           | 0.3     | 10     |
//! | total expected goals below         | 2.0     | 5      |
//! | possession gap at most             | 4 pts   | 3      |
//! | shots-on-target gap below          | 2       | 3      |
//! | head-to-head draw rate above       | 0.30    | 2      |
//! | both sides at or below league slot | 6th     | 2      |
//!
//! A score above 20 gives P(draw) = 0.35, otherwise 0.15. Conditions whose
//! inputs are unknown score nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::poisson::ExpectedGoals;
use crate::error::{check_probability, EngineError, Result};
use crate::models::Distribution;

/// Match statistics feeding the draw rules. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSignals {
    /// Ball possession in percent
    pub home_possession: Option<f64>,
    pub away_possession: Option<f64>,
    pub home_shots_on_target: Option<f64>,
    pub away_shots_on_target: Option<f64>,
    /// Share of previous meetings that ended level
    pub h2h_draw_rate: Option<f64>,
    /// League table positions (1 = top)
    pub home_position: Option<u32>,
    pub away_position: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawCondition {
    ExpectedGoalsClose,
    LowExpectedGoals,
    PossessionClose,
    ShotsOnTargetClose,
    DrawProneHeadToHead,
    BothMidTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawRuleConfig {
    pub xg_gap_below: f64,
    pub total_xg_below: f64,
    pub possession_gap_at_most: f64,
    pub shots_gap_below: f64,
    pub h2h_draw_rate_above: f64,
    /// Highest table position counted as mid-table or lower
    pub mid_table_min: u32,
    pub xg_gap_points: u32,
    pub total_xg_points: u32,
    pub possession_points: u32,
    pub shots_points: u32,
    pub h2h_points: u32,
    pub mid_table_points: u32,
    /// Score strictly above this selects `high_draw`
    pub score_threshold: u32,
    pub high_draw: f64,
    pub low_draw: f64,
}

impl Default for DrawRuleConfig {
    fn default() -> Self {
        DrawRuleConfig {
            xg_gap_below: 0.3,
            total_xg_below: 2.0,
            possession_gap_at_most: 4.0,
            shots_gap_below: 2.0,
            h2h_draw_rate_above: 0.30,
            mid_table_min: 6,
            xg_gap_points: 10,
            total_xg_points: 5,
            possession_points: 3,
            shots_points: 3,
            h2h_points: 2,
            mid_table_points: 2,
            score_threshold: 20,
            high_draw: 0.35,
            low_draw: 0.15,
        }
    }
}

impl DrawRuleConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, p) in [("high_draw", self.high_draw), ("low_draw", self.low_draw)] {
            if !(p > 0.0 && p < 1.0) {
                return Err(EngineError::InvalidConfig {
                    field,
                    reason: format!("{} is outside (0, 1)", p),
                });
            }
        }
        Ok(())
    }
}

/// Which draw conditions held and the resulting draw probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawRuleOutcome {
    pub score: u32,
    pub conditions: Vec<DrawCondition>,
    pub draw_probability: f64,
}

fn gap(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    a.zip(b).map(|(a, b)| (a - b).abs())
}

/// Score the draw conditions for a fixture.
pub fn draw_score(
    xg: &ExpectedGoals,
    signals: &DrawSignals,
    config: &DrawRuleConfig,
) -> Result<DrawRuleOutcome> {
    config.validate()?;
    if let Some(rate) = signals.h2h_draw_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(EngineError::InvalidProbability { value: rate });
        }
    }

    let checks = [
        (
            DrawCondition::ExpectedGoalsClose,
            (xg.home - xg.away).abs() < config.xg_gap_below,
            config.xg_gap_points,
        ),
        (
            DrawCondition::LowExpectedGoals,
            xg.total() < config.total_xg_below,
            config.total_xg_points,
        ),
        (
            DrawCondition::PossessionClose,
            gap(signals.home_possession, signals.away_possession)
                .is_some_and(|g| g <= config.possession_gap_at_most),
            config.possession_points,
        ),
        (
            DrawCondition::ShotsOnTargetClose,
            gap(signals.home_shots_on_target, signals.away_shots_on_target)
                .is_some_and(|g| g < config.shots_gap_below),
            config.shots_points,
        ),
        (
            DrawCondition::DrawProneHeadToHead,
            signals
                .h2h_draw_rate
                .is_some_and(|r| r > config.h2h_draw_rate_above),
            config.h2h_points,
        ),
        (
            DrawCondition::BothMidTable,
            signals
                .home_position
                .zip(signals.away_position)
                .is_some_and(|(h, a)| h >= config.mid_table_min && a >= config.mid_table_min),
            config.mid_table_points,
        ),
    ];

    let mut score = 0;
    let mut conditions = Vec::new();
    for (condition, held, points) in checks {
        if held {
            score += points;
            conditions.push(condition);
        }
    }
    let draw_probability = if score > config.score_threshold {
        config.high_draw
    } else {
        config.low_draw
    };
    debug!(
        "Draw rules: score {} from {:?}, P(draw) -> {:.2}",
        score, conditions, draw_probability
    );
    Ok(DrawRuleOutcome {
        score,
        conditions,
        draw_probability,
    })
}

/// Pin the "draw" outcome to `draw` and rescale the others to fill the rest,
/// keeping their ratios. Without any non-draw mass the rest is split evenly.
pub fn apply_draw_probability(dist: &Distribution, draw: f64) -> Result<Distribution> {
    let draw = check_probability(draw)?;
    if dist.get("draw").is_none() {
        return Err(EngineError::IncompleteMarket {
            reason: "distribution has no 'draw' outcome".into(),
        });
    }
    let is_draw = |label: &str| label.eq_ignore_ascii_case("draw");
    let others = dist.outcomes.iter().filter(|o| !is_draw(&o.label)).count();
    let non_draw: f64 = dist
        .outcomes
        .iter()
        .filter(|o| !is_draw(&o.label))
        .map(|o| o.probability)
        .sum();

    Ok(Distribution::from_pairs(dist.outcomes.iter().map(|o| {
        let p = if is_draw(&o.label) {
            draw
        } else if non_draw > 0.0 {
            o.probability * (1.0 - draw) / non_draw
        } else {
            (1.0 - draw) / others as f64
        };
        (o.label.clone(), p)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn xg(home: f64, away: f64) -> ExpectedGoals {
        ExpectedGoals { home, away }
    }

    fn even_signals() -> DrawSignals {
        DrawSignals {
            home_possession: Some(51.0),
            away_possession: Some(49.0),
            home_shots_on_target: Some(4.0),
            away_shots_on_target: Some(3.0),
            h2h_draw_rate: Some(0.40),
            home_position: Some(9),
            away_position: Some(11),
        }
    }

    #[test]
    fn every_condition_scores_twenty_five() {
        let r = draw_score(&xg(0.9, 0.8), &even_signals(), &DrawRuleConfig::default()).unwrap();
        assert_eq!(r.score, 25);
        assert_eq!(r.conditions.len(), 6);
        assert_relative_eq!(r.draw_probability, 0.35, epsilon = 1e-12);
    }

    #[test]
    fn threshold_is_strict() {
        // 10 + 5 + 3 + 2 = 20: not above the threshold
        let signals = DrawSignals {
            home_shots_on_target: Some(6.0),
            away_shots_on_target: Some(2.0),
            home_position: Some(2),
            ..even_signals()
        };
        let r = draw_score(&xg(0.9, 0.8), &signals, &DrawRuleConfig::default()).unwrap();
        assert_eq!(r.score, 20);
        assert!(!r.conditions.contains(&DrawCondition::BothMidTable));
        assert_relative_eq!(r.draw_probability, 0.15, epsilon = 1e-12);

        // Adding the shots condition back tips it over
        let signals = DrawSignals {
            home_position: Some(2),
            ..even_signals()
        };
        let r = draw_score(&xg(0.9, 0.8), &signals, &DrawRuleConfig::default()).unwrap();
        assert_eq!(r.score, 23);
        assert_relative_eq!(r.draw_probability, 0.35, epsilon = 1e-12);
    }

    #[test]
    fn unknown_signals_score_nothing() {
        let r = draw_score(&xg(0.9, 0.8), &DrawSignals::default(), &DrawRuleConfig::default())
            .unwrap();
        assert_eq!(r.score, 15);
        assert_eq!(
            r.conditions,
            vec![DrawCondition::ExpectedGoalsClose, DrawCondition::LowExpectedGoals]
        );
    }

    #[test]
    fn open_high_scoring_match_scores_low() {
        let r = draw_score(&xg(2.1, 1.2), &DrawSignals::default(), &DrawRuleConfig::default())
            .unwrap();
        assert_eq!(r.score, 0);
        assert!(r.conditions.is_empty());
    }

    #[test]
    fn rejects_bad_inputs() {
        let signals = DrawSignals {
            h2h_draw_rate: Some(1.5),
            ..Default::default()
        };
        assert!(draw_score(&xg(1.0, 1.0), &signals, &DrawRuleConfig::default()).is_err());
        let config = DrawRuleConfig {
            high_draw: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            draw_score(&xg(1.0, 1.0), &DrawSignals::default(), &config),
            Err(EngineError::InvalidConfig { field: "high_draw", .. })
        ));
    }

    #[test]
    fn rescales_home_and_away_around_the_draw() {
        let d = Distribution::from_pairs([("home", 0.45), ("draw", 0.25), ("away", 0.30)]);
        let c = apply_draw_probability(&d, 0.35).unwrap();
        assert_relative_eq!(c.get("draw").unwrap(), 0.35, epsilon = 1e-12);
        // 0.45 · 0.65 / 0.75
        assert_relative_eq!(c.get("home").unwrap(), 0.39, epsilon = 1e-12);
        assert_relative_eq!(c.get("away").unwrap(), 0.26, epsilon = 1e-12);
        assert_relative_eq!(c.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn all_draw_mass_splits_the_rest_evenly() {
        let d = Distribution::from_pairs([("home", 0.0), ("draw", 1.0), ("away", 0.0)]);
        let c = apply_draw_probability(&d, 0.15).unwrap();
        assert_relative_eq!(c.get("home").unwrap(), 0.425, epsilon = 1e-12);
        assert_relative_eq!(c.get("away").unwrap(), 0.425, epsilon = 1e-12);
    }

    #[test]
    fn two_way_distribution_has_no_draw_to_pin() {
        let d = Distribution::from_pairs([("home", 0.6), ("away", 0.4)]);
        assert!(matches!(
            apply_draw_probability(&d, 0.3),
            Err(EngineError::IncompleteMarket { .. })
        ));
    }
}
