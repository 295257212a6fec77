//! Independent-Poisson scoreline model.
//!
//! Each side's goals are modelled as an independent Poisson count. Expected
//! goals blend two estimates for stability:
//!
//!   simple:            λ = attack
//!   defense-adjusted:  λ' = (attack + opponent_defense) / 2
//!   final:             (λ + λ') / 2, home side × home-advantage multiplier
//!
//! The joint probability of every scoreline `i-j` with `i, j ≤ max_goals` is
//! the product of the two marginal pmfs; summing the grid below, on and
//! above the diagonal gives P(home), P(draw), P(away).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{Distribution, TeamForm};

/// Default truncation of the score grid (0..=6 goals per side).
pub const DEFAULT_MAX_GOALS: u32 = 6;

/// Hard cap so a misconfigured grid cannot grow unbounded.
const MAX_GRID_GOALS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoissonConfig {
    pub max_goals: u32,
}

impl Default for PoissonConfig {
    fn default() -> Self {
        PoissonConfig {
            max_goals: DEFAULT_MAX_GOALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

impl ExpectedGoals {
    pub fn total(&self) -> f64 {
        self.home + self.away
    }
}

/// Expected goals for both sides; home advantage applies to the home side only.
pub fn expected_goals(home: &TeamForm, away: &TeamForm) -> Result<ExpectedGoals> {
    home.validate()?;
    away.validate()?;

    let home_simple = home.attack;
    let away_simple = away.attack;
    let home_adjusted = (home.attack + away.defense) / 2.0;
    let away_adjusted = (away.attack + home.defense) / 2.0;

    Ok(ExpectedGoals {
        home: (home_simple + home_adjusted) / 2.0 * home.home_advantage,
        away: (away_simple + away_adjusted) / 2.0,
    })
}

/// Poisson pmf for k = 0..=max_k, built iteratively (p_k = p_{k-1}·λ/k) to
/// avoid factorial overflow.
pub fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let mut pmf = Vec::with_capacity(max_k as usize + 1);
    let mut p = (-lambda).exp();
    pmf.push(p);
    for k in 1..=max_k {
        p *= lambda / k as f64;
        pmf.push(p);
    }
    pmf
}

/// A correct-score probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreProbability {
    pub home_goals: u32,
    pub away_goals: u32,
    pub probability: f64,
}

/// Truncated joint scoreline distribution. `cells[i][j]` = P(home i, away j).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGrid {
    cells: Vec<Vec<f64>>,
}

impl ScoreGrid {
    pub fn new(lambda_home: f64, lambda_away: f64, max_goals: u32) -> Result<Self> {
        for (field, lambda) in [("lambda_home", lambda_home), ("lambda_away", lambda_away)] {
            if !lambda.is_finite() || lambda < 0.0 {
                return Err(EngineError::InvalidConfig {
                    field,
                    reason: format!("expected goals {} must be non-negative", lambda),
                });
            }
        }
        if max_goals > MAX_GRID_GOALS {
            return Err(EngineError::InvalidConfig {
                field: "max_goals",
                reason: format!("{} exceeds the limit of {}", max_goals, MAX_GRID_GOALS),
            });
        }
        let home = poisson_pmf(lambda_home, max_goals);
        let away = poisson_pmf(lambda_away, max_goals);
        let cells = home
            .iter()
            .map(|ph| away.iter().map(|pa| ph * pa).collect())
            .collect();
        Ok(ScoreGrid { cells })
    }

    pub fn max_goals(&self) -> u32 {
        (self.cells.len() - 1) as u32
    }

    pub fn probability(&self, home_goals: u32, away_goals: u32) -> f64 {
        self.cells
            .get(home_goals as usize)
            .and_then(|row| row.get(away_goals as usize))
            .copied()
            .unwrap_or(0.0)
    }

    fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, p)| (i, j, *p)))
    }

    /// Probability mass captured by the truncated grid (→ 1 as max_goals grows).
    pub fn mass(&self) -> f64 {
        self.iter().map(|(_, _, p)| p).sum()
    }

    /// Raw (home, draw, away) mass, not renormalized.
    pub fn outcome_probabilities(&self) -> (f64, f64, f64) {
        self.iter()
            .fold((0.0, 0.0, 0.0), |(h, d, a), (i, j, p)| match i.cmp(&j) {
                std::cmp::Ordering::Greater => (h + p, d, a),
                std::cmp::Ordering::Equal => (h, d + p, a),
                std::cmp::Ordering::Less => (h, d, a + p),
            })
    }

    /// Grid mass usable as a normalizer; fails when every cell underflowed.
    fn normalizer(&self) -> Result<f64> {
        let mass = self.mass();
        if mass.is_finite() && mass > 0.0 {
            Ok(mass)
        } else {
            Err(EngineError::NoData(format!(
                "score grid holds no probability mass ({})",
                mass
            )))
        }
    }

    /// P(home + away goals > line), renormalized over the grid mass.
    pub fn prob_total_over(&self, line: f64) -> Result<f64> {
        let over: f64 = self
            .iter()
            .filter(|(i, j, _)| (*i + *j) as f64 > line)
            .map(|(_, _, p)| p)
            .sum();
        Ok(over / self.normalizer()?)
    }

    /// P(both sides score at least once), renormalized over the grid mass.
    pub fn prob_both_score(&self) -> Result<f64> {
        let btts: f64 = self
            .iter()
            .filter(|(i, j, _)| *i > 0 && *j > 0)
            .map(|(_, _, p)| p)
            .sum();
        Ok(btts / self.normalizer()?)
    }

    /// The `n` most likely correct scores, most likely first.
    pub fn most_likely_scores(&self, n: usize) -> Vec<ScoreProbability> {
        let mut scores: Vec<ScoreProbability> = self
            .iter()
            .map(|(i, j, p)| ScoreProbability {
                home_goals: i as u32,
                away_goals: j as u32,
                probability: p,
            })
            .collect();
        scores.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        scores.truncate(n);
        scores
    }
}

/// Model output for a fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoissonPrediction {
    pub expected_goals: ExpectedGoals,
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
    /// Grid mass captured at the configured max_goals
    pub grid_mass: f64,
    /// home/draw/away renormalized to sum to 1
    pub distribution: Distribution,
    pub likely_scores: Vec<ScoreProbability>,
}

/// Run the scoreline model for `home` vs `away`.
pub fn predict(
    home: &TeamForm,
    away: &TeamForm,
    config: &PoissonConfig,
) -> Result<PoissonPrediction> {
    let xg = expected_goals(home, away)?;
    let grid = ScoreGrid::new(xg.home, xg.away, config.max_goals)?;
    let (home_win, draw, away_win) = grid.outcome_probabilities();
    let grid_mass = home_win + draw + away_win;

    debug!(
        "Poisson {} vs {}: xG {:.2}-{:.2}, H/D/A {:.3}/{:.3}/{:.3}, mass {:.4}",
        home.name, away.name, xg.home, xg.away, home_win, draw, away_win, grid_mass
    );

    let distribution =
        Distribution::from_pairs([("home", home_win), ("draw", draw), ("away", away_win)])
            .normalized()?;

    Ok(PoissonPrediction {
        expected_goals: xg,
        home_win,
        draw,
        away_win,
        grid_mass,
        distribution,
        likely_scores: grid.most_likely_scores(5),
    })
}
