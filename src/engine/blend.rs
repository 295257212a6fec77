//! Market/model probability blending.
//!
//! The market price is treated as a prior and the goal model as evidence:
//!
//!   w            = clamp(0.35 + 0.35·proximity + 0.30·data_quality, 0.40, 0.80)
//!   logit(p_b)   = w·logit(p_mkt) + (1−w)·logit(p_mdl)
//!   p_final      = p_mkt + clamp(p_b − p_mkt, −max_dev, +max_dev)
//!
//! after which the outcome set is brought back to a total of 1 without any
//! outcome leaving its deviation band or the [0.02, 0.98] guard.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::logistic::{logit, sigmoid};
use crate::error::{EngineError, Result};
use crate::models::Distribution;

pub const MAX_DEV_TWO_WAY: f64 = 0.12;
pub const MAX_DEV_THREE_WAY: f64 = 0.10;
/// Tighter cap for a strong market favourite the model disagrees with.
pub const CONTRARIAN_MAX_DEV: f64 = 0.08;
pub const CONTRARIAN_THRESHOLD: f64 = 0.60;

pub const PROBABILITY_FLOOR: f64 = 0.02;
pub const PROBABILITY_CEILING: f64 = 0.98;

/// Bounds of the linear fallback blend.
const LINEAR_FLOOR: f64 = 0.01;
const LINEAR_CEILING: f64 = 0.99;

const MIN_WEIGHT: f64 = 0.30;
const MAX_WEIGHT: f64 = 0.80;
const MIN_CAP: f64 = 0.02;

/// Relative nudge applied to one outcome before shrinkage, e.g. a late
/// injury report: `relative = -0.05` lowers that outcome by 5% of itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityAdjustment {
    pub label: String,
    pub relative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Fixed market weight; derived from proximity/data quality when absent
    pub market_weight: Option<f64>,
    /// 0 = market just opened, 1 = at kickoff
    pub proximity: f64,
    /// Confidence in the market data, 0–1
    pub data_quality: f64,
    pub max_dev_two_way: f64,
    pub max_dev_three_way: f64,
    pub contrarian_threshold: f64,
    pub contrarian_max_dev: f64,
    pub adjustments: Vec<ProbabilityAdjustment>,
}

impl Default for BlendConfig {
    fn default() -> Self {
        BlendConfig {
            market_weight: None,
            proximity: 0.5,
            data_quality: 0.5,
            max_dev_two_way: MAX_DEV_TWO_WAY,
            max_dev_three_way: MAX_DEV_THREE_WAY,
            contrarian_threshold: CONTRARIAN_THRESHOLD,
            contrarian_max_dev: CONTRARIAN_MAX_DEV,
            adjustments: Vec::new(),
        }
    }
}

impl BlendConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(w) = self.market_weight {
            if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&w) {
                return Err(EngineError::InvalidConfig {
                    field: "market_weight",
                    reason: format!("{} is outside [{}, {}]", w, MIN_WEIGHT, MAX_WEIGHT),
                });
            }
        }
        for (field, v) in [("proximity", self.proximity), ("data_quality", self.data_quality)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::InvalidConfig {
                    field,
                    reason: format!("{} is outside [0, 1]", v),
                });
            }
        }
        for (field, v) in [
            ("max_dev_two_way", self.max_dev_two_way),
            ("max_dev_three_way", self.max_dev_three_way),
            ("contrarian_max_dev", self.contrarian_max_dev),
        ] {
            if !(MIN_CAP..=0.5).contains(&v) {
                return Err(EngineError::InvalidConfig {
                    field,
                    reason: format!("{} is outside [{}, 0.5]", v, MIN_CAP),
                });
            }
        }
        if !(0.5..=1.0).contains(&self.contrarian_threshold) {
            return Err(EngineError::InvalidConfig {
                field: "contrarian_threshold",
                reason: format!("{} is outside [0.5, 1]", self.contrarian_threshold),
            });
        }
        if let Some(adj) = self
            .adjustments
            .iter()
            .find(|a| !a.relative.is_finite() || a.relative <= -1.0)
        {
            return Err(EngineError::InvalidConfig {
                field: "adjustments",
                reason: format!(
                    "relative change {} for '{}' must exceed -1",
                    adj.relative, adj.label
                ),
            });
        }
        Ok(())
    }

    /// Market weight actually used for the blend.
    pub fn weight(&self) -> f64 {
        self.market_weight
            .unwrap_or_else(|| market_weight(self.proximity, self.data_quality))
    }
}

/// Dynamic market weight from proximity to kickoff and market data quality.
pub fn market_weight(proximity: f64, data_quality: f64) -> f64 {
    (0.35 + 0.35 * proximity + 0.30 * data_quality).clamp(0.40, MAX_WEIGHT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMethod {
    Logit,
    /// Used when a probability sits at 0 or 1 and logits are undefined
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendResult {
    pub distribution: Distribution,
    pub market_weight: f64,
    pub method: BlendMethod,
    /// Deviation cap applied to each outcome, in outcome order
    pub caps: Vec<f64>,
    pub contrarian_applied: bool,
}

fn logit_safe(p: f64) -> bool {
    p > 0.0 && p < 1.0
}

fn index_of_max(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Blend a de-vigged market distribution with a model distribution over the
/// same outcome labels. The result is ordered like `market`.
pub fn blend(
    market: &Distribution,
    model: &Distribution,
    config: &BlendConfig,
) -> Result<BlendResult> {
    config.validate()?;
    if market.len() < 2 {
        return Err(EngineError::IncompleteMarket {
            reason: format!("blend needs at least two outcomes, got {}", market.len()),
        });
    }
    if market
        .probabilities()
        .iter()
        .chain(model.probabilities().iter())
        .any(|p| !p.is_finite() || *p < 0.0)
    {
        return Err(EngineError::NoData(
            "blend inputs contain negative or non-finite probabilities".into(),
        ));
    }

    let market = market.normalized()?;
    let model = model.normalized()?;
    let labels: Vec<String> = market.outcomes.iter().map(|o| o.label.clone()).collect();
    let p_mkt = market.probabilities();
    let p_mdl = labels
        .iter()
        .map(|l| {
            model.get(l).ok_or_else(|| EngineError::IncompleteMarket {
                reason: format!("model has no probability for '{}'", l),
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let w = config.weight();
    let method = if p_mkt.iter().chain(p_mdl.iter()).all(|p| logit_safe(*p)) {
        BlendMethod::Logit
    } else {
        BlendMethod::Linear
    };

    let mut p_blend: Vec<f64> = p_mkt
        .iter()
        .zip(&p_mdl)
        .map(|(pm, pd)| match method {
            BlendMethod::Logit => sigmoid(w * logit(*pm) + (1.0 - w) * logit(*pd)),
            BlendMethod::Linear => (w * pm + (1.0 - w) * pd).clamp(LINEAR_FLOOR, LINEAR_CEILING),
        })
        .collect();

    for adj in &config.adjustments {
        let idx = labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(&adj.label))
            .ok_or_else(|| EngineError::InvalidConfig {
                field: "adjustments",
                reason: format!("unknown outcome '{}'", adj.label),
            })?;
        p_blend[idx] *= 1.0 + adj.relative;
    }
    let blend_total: f64 = p_blend.iter().sum();
    for p in &mut p_blend {
        *p /= blend_total;
    }

    // Deviation caps, tightened for a strong favourite the model disputes.
    let base_cap = if labels.len() == 2 {
        config.max_dev_two_way
    } else {
        config.max_dev_three_way
    };
    let mut caps = vec![base_cap; labels.len()];
    let fav = index_of_max(&p_mkt);
    let contrarian_applied =
        p_mkt[fav] >= config.contrarian_threshold && index_of_max(&p_mdl) != fav;
    if contrarian_applied {
        caps[fav] = caps[fav].min(config.contrarian_max_dev);
        info!(
            "Contrarian safeguard: market favourite '{}' at {:.3}, model disagrees; cap {:.2}",
            labels[fav], p_mkt[fav], caps[fav]
        );
    }

    let deltas = bounded_deltas(&p_mkt, &p_blend, &caps)?;
    let distribution = Distribution::from_pairs(
        labels
            .into_iter()
            .zip(p_mkt.iter().zip(&deltas).map(|(pm, d)| pm + d)),
    );

    debug!(
        "Blend w={:.3} method={:?} final={:?}",
        w,
        method,
        distribution.probabilities()
    );

    Ok(BlendResult {
        distribution,
        market_weight: w,
        method,
        caps,
        contrarian_applied,
    })
}

/// Shrink `target − base` into each outcome's band and redistribute the
/// residual so the deltas sum to zero.
///
/// Band for outcome i: [max(−cap, floor − base), min(cap, ceiling − base)].
fn bounded_deltas(base: &[f64], target: &[f64], caps: &[f64]) -> Result<Vec<f64>> {
    let lo: Vec<f64> = base
        .iter()
        .zip(caps)
        .map(|(b, c)| (-c).max(PROBABILITY_FLOOR - b))
        .collect();
    let hi: Vec<f64> = base
        .iter()
        .zip(caps)
        .map(|(b, c)| c.min(PROBABILITY_CEILING - b))
        .collect();

    let lo_sum: f64 = lo.iter().sum();
    let hi_sum: f64 = hi.iter().sum();
    if lo.iter().zip(&hi).any(|(l, h)| l > h) || lo_sum > 0.0 || hi_sum < 0.0 {
        return Err(EngineError::InvalidConfig {
            field: "max_dev",
            reason: "deviation caps cannot keep every outcome inside [0.02, 0.98]".into(),
        });
    }

    let mut deltas: Vec<f64> = target
        .iter()
        .zip(base)
        .zip(lo.iter().zip(&hi))
        .map(|((t, b), (l, h))| (t - b).clamp(*l, *h))
        .collect();

    let residual: f64 = deltas.iter().sum();
    if residual > 0.0 {
        let room: Vec<f64> = deltas.iter().zip(&lo).map(|(d, l)| d - l).collect();
        let total: f64 = room.iter().sum();
        if total > 0.0 {
            let t = (residual / total).min(1.0);
            for (d, r) in deltas.iter_mut().zip(&room) {
                *d -= t * r;
            }
        }
    } else if residual < 0.0 {
        let room: Vec<f64> = deltas.iter().zip(&hi).map(|(d, h)| h - d).collect();
        let total: f64 = room.iter().sum();
        if total > 0.0 {
            let t = (-residual / total).min(1.0);
            for (d, r) in deltas.iter_mut().zip(&room) {
                *d += t * r;
            }
        }
    }
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn three(h: f64, d: f64, a: f64) -> Distribution {
        Distribution::from_pairs([("home", h), ("draw", d), ("away", a)])
    }

    fn two(h: f64, a: f64) -> Distribution {
        Distribution::from_pairs([("home", h), ("away", a)])
    }

    fn assert_invariants(market: &Distribution, result: &BlendResult) {
        let market = market.normalized().unwrap();
        assert_relative_eq!(result.distribution.sum(), 1.0, epsilon = 1e-9);
        for ((pm, pf), cap) in market
            .probabilities()
            .iter()
            .zip(result.distribution.probabilities())
            .zip(&result.caps)
        {
            assert!((pf - pm).abs() <= cap + 1e-9, "|{} - {}| > {}", pf, pm, cap);
            assert!(pf >= PROBABILITY_FLOOR - 1e-9 && pf <= PROBABILITY_CEILING + 1e-9);
        }
    }

    #[test]
    fn weight_formula_and_clamp() {
        assert_relative_eq!(market_weight(0.0, 0.0), 0.40, epsilon = 1e-12);
        assert_relative_eq!(market_weight(1.0, 1.0), 0.80, epsilon = 1e-12);
        assert_relative_eq!(market_weight(0.5, 0.5), 0.675, epsilon = 1e-12);
    }

    #[test]
    fn config_rejects_out_of_range_weight() {
        let cfg = BlendConfig {
            market_weight: Some(0.9),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig { .. })));
        let ok = BlendConfig {
            market_weight: Some(0.30),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn identical_inputs_are_unchanged() {
        let m = three(0.5, 0.3, 0.2);
        let r = blend(&m, &m, &BlendConfig::default()).unwrap();
        assert_eq!(r.method, BlendMethod::Logit);
        for (a, b) in m.probabilities().iter().zip(r.distribution.probabilities()) {
            assert_relative_eq!(*a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn two_way_logit_blend_lies_between_inputs() {
        let m = two(0.55, 0.45);
        let d = two(0.65, 0.35);
        let r = blend(&m, &d, &BlendConfig::default()).unwrap();
        let home = r.distribution.get("home").unwrap();
        assert!(home > 0.55 && home < 0.65);
        assert_relative_eq!(r.distribution.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn large_disagreement_is_capped() {
        let m = three(0.50, 0.28, 0.22);
        let d = three(0.10, 0.20, 0.70);
        let cfg = BlendConfig {
            market_weight: Some(0.30),
            ..Default::default()
        };
        let r = blend(&m, &d, &cfg).unwrap();
        assert_invariants(&m, &r);
        assert_relative_eq!(r.distribution.get("away").unwrap(), 0.32, epsilon = 1e-9);
    }

    #[test]
    fn contrarian_cap_tightens_favourite() {
        let m = two(0.70, 0.30);
        let d = two(0.30, 0.70);
        let r = blend(&m, &d, &BlendConfig::default()).unwrap();
        assert!(r.contrarian_applied);
        assert_relative_eq!(r.caps[0], CONTRARIAN_MAX_DEV, epsilon = 1e-12);
        assert_relative_eq!(r.distribution.get("home").unwrap(), 0.62, epsilon = 1e-9);
        assert_invariants(&m, &r);
    }

    #[test]
    fn linear_fallback_on_degenerate_model() {
        let m = three(0.5, 0.3, 0.2);
        let d = three(1.0, 0.0, 0.0);
        let r = blend(&m, &d, &BlendConfig::default()).unwrap();
        assert_eq!(r.method, BlendMethod::Linear);
        assert_invariants(&m, &r);
    }

    #[test]
    fn adjustment_nudges_then_renormalizes() {
        let m = three(0.45, 0.30, 0.25);
        let base = blend(&m, &m, &BlendConfig::default()).unwrap();
        let cfg = BlendConfig {
            adjustments: vec![ProbabilityAdjustment {
                label: "home".into(),
                relative: -0.10,
            }],
            ..Default::default()
        };
        let r = blend(&m, &m, &cfg).unwrap();
        assert!(r.distribution.get("home").unwrap() < base.distribution.get("home").unwrap());
        assert!(r.distribution.get("away").unwrap() > base.distribution.get("away").unwrap());
        assert_invariants(&m, &r);
    }

    #[test]
    fn unknown_adjustment_label_is_rejected() {
        let m = two(0.5, 0.5);
        let cfg = BlendConfig {
            adjustments: vec![ProbabilityAdjustment {
                label: "draw".into(),
                relative: 0.1,
            }],
            ..Default::default()
        };
        assert!(blend(&m, &m, &cfg).is_err());
    }

    #[test]
    fn floor_and_ceiling_hold_for_extreme_markets() {
        let m = three(0.985, 0.01, 0.005);
        let d = three(0.99, 0.008, 0.002);
        let r = blend(&m, &d, &BlendConfig::default()).unwrap();
        assert_invariants(&m, &r);
        assert!(r.distribution.get("away").unwrap() >= PROBABILITY_FLOOR - 1e-12);
    }

    #[test]
    fn missing_model_outcome_is_incomplete() {
        let m = three(0.5, 0.3, 0.2);
        let d = two(0.6, 0.4);
        assert!(matches!(
            blend(&m, &d, &BlendConfig::default()),
            Err(EngineError::IncompleteMarket { .. })
        ));
    }

    #[test]
    fn bounds_hold_across_a_grid() {
        let markets = [
            three(0.60, 0.25, 0.15),
            three(0.33, 0.34, 0.33),
            three(0.15, 0.25, 0.60),
            three(0.80, 0.15, 0.05),
        ];
        let models = [
            three(0.20, 0.30, 0.50),
            three(0.70, 0.20, 0.10),
            three(0.40, 0.40, 0.20),
            three(0.05, 0.05, 0.90),
        ];
        for m in &markets {
            for d in &models {
                for prox in [0.0, 0.5, 1.0] {
                    for q in [0.0, 0.5, 1.0] {
                        let cfg = BlendConfig {
                            proximity: prox,
                            data_quality: q,
                            ..Default::default()
                        };
                        let r = blend(m, d, &cfg).unwrap();
                        assert!(r.market_weight >= 0.40 && r.market_weight <= 0.80);
                        assert_invariants(m, &r);
                    }
                }
            }
        }
        for (h, dh) in [(0.55, 0.20), (0.20, 0.80), (0.90, 0.95), (0.50, 0.50)] {
            let m = two(h, 1.0 - h);
            let d = two(dh, 1.0 - dh);
            let r = blend(&m, &d, &BlendConfig::default()).unwrap();
            assert_invariants(&m, &r);
        }
    }
}
