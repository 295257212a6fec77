//! Platt-style recalibration of match-outcome forecasts.
//!
//! Every outcome probability of a forecast is mapped through
//! `q = sigmoid(a·logit(p) + b)` and the outcome set is renormalized. The two
//! parameters are shared across outcomes and fitted on settled fixtures (a
//! forecast plus the label that actually happened) by minimising the
//! multi-outcome log-loss of the renormalized forecast.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::logistic::{logit, sigmoid};
use crate::error::{EngineError, Result};
use crate::models::Distribution;

/// Probabilities are kept this far from 0 and 1 before taking log-odds.
const EPS: f64 = 1e-4;

/// Fewer settled fixtures than this cannot support a fit.
const MIN_SAMPLES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattCalibration {
    pub a: f64,
    pub b: f64,
}

impl Default for PlattCalibration {
    /// Identity mapping.
    fn default() -> Self {
        PlattCalibration { a: 1.0, b: 0.0 }
    }
}

/// One settled fixture: what the model said, and what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub forecast: Distribution,
    /// Label of the outcome that occurred, e.g. "draw"
    pub result: String,
}

impl CalibrationSample {
    pub fn new(forecast: Distribution, result: impl Into<String>) -> Self {
        CalibrationSample {
            forecast,
            result: result.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub max_iters: usize,
    /// Initial step size; halved whenever a step would increase the loss
    pub learning_rate: f64,
    /// Shrinkage of `a` towards the identity slope
    pub l2: f64,
    /// Stop once the gradient norm falls below this
    pub tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            max_iters: 500,
            learning_rate: 0.5,
            l2: 1e-3,
            tolerance: 1e-7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitMetrics {
    pub samples: usize,
    pub iterations: usize,
    pub logloss_before: f64,
    pub logloss_after: f64,
    /// Multi-outcome Brier score, Σ (p_i − y_i)² averaged over fixtures
    pub brier_before: f64,
    pub brier_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitResult {
    pub calibration: PlattCalibration,
    pub metrics: FitMetrics,
}

impl FitResult {
    /// Relative log-loss improvement (0 when the fit made things worse).
    pub fn logloss_improvement(&self) -> f64 {
        let before = self.metrics.logloss_before.max(1e-9);
        ((self.metrics.logloss_before - self.metrics.logloss_after) / before).max(0.0)
    }
}

fn bounded_logit(p: f64) -> f64 {
    logit(p.clamp(EPS, 1.0 - EPS))
}

pub fn apply_platt(raw_prob: f64, model: PlattCalibration) -> f64 {
    sigmoid(model.a * bounded_logit(raw_prob) + model.b)
}

/// Calibrate every outcome of a model distribution, then renormalize.
pub fn calibrate_distribution(
    dist: &Distribution,
    model: PlattCalibration,
) -> Result<Distribution> {
    Distribution::from_pairs(
        dist.outcomes
            .iter()
            .map(|o| (o.label.clone(), apply_platt(o.probability, model))),
    )
    .normalized()
}

/// A settled fixture reduced to what the optimiser needs.
struct Settled {
    /// Normalized forecast probabilities
    raw: Vec<f64>,
    logits: Vec<f64>,
    winner: usize,
}

fn settle(samples: &[CalibrationSample]) -> Result<Vec<Settled>> {
    samples
        .iter()
        .map(|s| {
            let forecast = s.forecast.normalized()?;
            let winner = forecast
                .outcomes
                .iter()
                .position(|o| o.label.eq_ignore_ascii_case(&s.result))
                .ok_or_else(|| EngineError::IncompleteMarket {
                    reason: format!("forecast has no outcome '{}'", s.result),
                })?;
            let raw = forecast.probabilities();
            let logits = raw.iter().map(|p| bounded_logit(*p)).collect();
            Ok(Settled {
                raw,
                logits,
                winner,
            })
        })
        .collect()
}

/// Mean loss and gradient for `(a, b)`. Per fixture, with `q_i` the mapped
/// probabilities and `Q = Σ q_i`, the loss is `ln Q − ln q_winner`.
fn objective(data: &[Settled], a: f64, b: f64, l2: f64) -> (f64, f64, f64) {
    let n = data.len() as f64;
    let (mut loss, mut grad_a, mut grad_b) = (0.0, 0.0, 0.0);
    for s in data {
        let q: Vec<f64> = s.logits.iter().map(|x| sigmoid(a * x + b)).collect();
        let total: f64 = q.iter().sum();
        let q_win = q[s.winner].max(f64::MIN_POSITIVE);
        loss += total.ln() - q_win.ln();
        for (qi, xi) in q.iter().zip(&s.logits) {
            let slope = qi * (1.0 - qi) / total;
            grad_a += slope * xi;
            grad_b += slope;
        }
        grad_a -= (1.0 - q_win) * s.logits[s.winner];
        grad_b -= 1.0 - q_win;
    }
    (
        loss / n + 0.5 * l2 * (a - 1.0).powi(2),
        grad_a / n + l2 * (a - 1.0),
        grad_b / n,
    )
}

/// (log-loss, Brier) of a set of forecasts for one fixture's winner.
fn score(probs: &[f64], winner: usize) -> (f64, f64) {
    let logloss = -probs[winner].clamp(EPS, 1.0).ln();
    let brier = probs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let y = if i == winner { 1.0 } else { 0.0 };
            (p - y).powi(2)
        })
        .sum();
    (logloss, brier)
}

/// Fit a shared Platt mapping on settled fixtures by gradient descent with a
/// step-halving line search. At least two different results must occur.
pub fn fit_platt(samples: &[CalibrationSample], config: &FitConfig) -> Result<FitResult> {
    if samples.len() < MIN_SAMPLES {
        return Err(EngineError::NoData(format!(
            "calibration needs at least {} settled fixtures, got {}",
            MIN_SAMPLES,
            samples.len()
        )));
    }
    let data = settle(samples)?;
    let first = &samples[0].result;
    if samples.iter().all(|s| s.result.eq_ignore_ascii_case(first)) {
        return Err(EngineError::NoData(format!(
            "every settled fixture ended '{}'; nothing to calibrate against",
            first
        )));
    }

    let (mut a, mut b) = (1.0, 0.0);
    let (mut loss, mut grad_a, mut grad_b) = objective(&data, a, b, config.l2);
    let mut lr = config.learning_rate;
    let mut iterations = 0;
    while iterations < config.max_iters {
        iterations += 1;
        if grad_a.hypot(grad_b) < config.tolerance {
            break;
        }
        let (next_a, next_b) = (a - lr * grad_a, b - lr * grad_b);
        let (next_loss, next_ga, next_gb) = objective(&data, next_a, next_b, config.l2);
        if next_loss.is_finite() && next_loss <= loss {
            (a, b, loss, grad_a, grad_b) = (next_a, next_b, next_loss, next_ga, next_gb);
        } else {
            lr *= 0.5;
            if lr < 1e-12 {
                debug!("Calibration step size collapsed after {} iterations", iterations);
                break;
            }
        }
    }

    let model = PlattCalibration { a, b };
    let (mut ll_before, mut ll_after, mut br_before, mut br_after) = (0.0, 0.0, 0.0, 0.0);
    for s in &data {
        let mapped: Vec<f64> = s.raw.iter().map(|p| apply_platt(*p, model)).collect();
        let total: f64 = mapped.iter().sum();
        let calibrated: Vec<f64> = mapped.iter().map(|q| q / total).collect();
        let before = score(&s.raw, s.winner);
        let after = score(&calibrated, s.winner);
        ll_before += before.0;
        br_before += before.1;
        ll_after += after.0;
        br_after += after.1;
    }
    let n = data.len() as f64;
    let metrics = FitMetrics {
        samples: data.len(),
        iterations,
        logloss_before: ll_before / n,
        logloss_after: ll_after / n,
        brier_before: br_before / n,
        brier_after: br_after / n,
    };
    info!(
        "Calibration on {} fixtures: a={:.4}, b={:.4}, logloss {:.4}->{:.4}, brier {:.4}->{:.4}",
        metrics.samples,
        a,
        b,
        metrics.logloss_before,
        metrics.logloss_after,
        metrics.brier_before,
        metrics.brier_after
    );
    Ok(FitResult {
        calibration: model,
        metrics,
    })
}
