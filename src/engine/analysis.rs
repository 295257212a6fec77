//! Per-fixture analysis pipeline.
//!
//! Runs the whole engine for one match: de-vig the match-winner quote, run
//! the Poisson model (optionally Platt-calibrated, then draw-rule adjusted
//! when match signals are supplied), blend the two, price every outcome for
//! EV and Kelly stake, then run and rank the side-market analyzers. Either
//! probability source may be missing; the pipeline falls back to the other
//! and records why in `warnings`. Side markets fail independently.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::blend::{blend, BlendConfig, BlendResult};
use crate::engine::calibration::{calibrate_distribution, PlattCalibration};
use crate::engine::devig::{complete_legs, devig_quote, DeVigMethod, DeViggedMarket};
use crate::engine::draw_rule::{
    apply_draw_probability, draw_score, DrawRuleConfig, DrawRuleOutcome, DrawSignals,
};
use crate::engine::ev::{calculate_ev, EvThresholds};
use crate::engine::kelly::{kelly, StakingConfig};
use crate::engine::markets::{
    analyze_btts, analyze_dnb, analyze_over_under, rank_markets, MarketThresholds,
    OverUnderMethod,
};
use crate::engine::poisson::{predict, PoissonConfig, PoissonPrediction};
use crate::error::{check_probability, check_stake, EngineError, Result};
use crate::models::{
    Distribution, EVResult, KellyResult, MarketQuote, MarketRecommendation, MarketType,
    OutcomePrice, ScoringProfile, TeamForm,
};

// ── Configuration ────────────────────────────────────────────────────────────

/// Deployment-level settings shared by every fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub bankroll: f64,
    /// Stake used to express EV in currency units
    pub reference_stake: f64,
    pub staking: StakingConfig,
    pub ev_thresholds: EvThresholds,
    pub market_thresholds: MarketThresholds,
    pub poisson: PoissonConfig,
    pub over_under_method: OverUnderMethod,
    pub devig_method: DeVigMethod,
    /// Platt model applied to Poisson probabilities before blending
    pub calibration: Option<PlattCalibration>,
    /// Scoring used when a fixture carries draw signals
    pub draw_rule: DrawRuleConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            bankroll: 1000.0,
            reference_stake: 10.0,
            staking: StakingConfig::default(),
            ev_thresholds: EvThresholds::default(),
            market_thresholds: MarketThresholds::default(),
            poisson: PoissonConfig::default(),
            over_under_method: OverUnderMethod::default(),
            devig_method: DeVigMethod::default(),
            calibration: None,
            draw_rule: DrawRuleConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        check_stake(self.bankroll).map_err(|_| EngineError::InvalidConfig {
            field: "bankroll",
            reason: format!("{} must be positive", self.bankroll),
        })?;
        check_stake(self.reference_stake).map_err(|_| EngineError::InvalidConfig {
            field: "reference_stake",
            reason: format!("{} must be positive", self.reference_stake),
        })?;
        self.staking.validate()?;
        self.draw_rule.validate()
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BttsInput {
    pub quote: MarketQuote,
    pub home: ScoringProfile,
    pub away: ScoringProfile,
}

/// Everything known about one fixture. All parts are optional; the analyzer
/// uses whatever is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchInput {
    pub home: Option<TeamForm>,
    pub away: Option<TeamForm>,
    pub match_winner: Option<MarketQuote>,
    pub blend: BlendConfig,
    pub over_under: Option<MarketQuote>,
    pub btts: Option<BttsInput>,
    pub draw_no_bet: Option<MarketQuote>,
    /// Draw probability for draw-no-bet; the final distribution's draw
    /// probability is used when absent
    pub draw_probability: Option<f64>,
    /// Match statistics for the draw rules; the rules are skipped when absent
    pub draw_signals: Option<DrawSignals>,
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilitySource {
    Blended,
    MarketOnly,
    ModelOnly,
}

/// EV and stake for one match-winner outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeValue {
    pub label: String,
    pub probability: f64,
    pub odds: Option<f64>,
    pub bookmaker: Option<String>,
    pub ev: Option<EVResult>,
    pub kelly: Option<KellyResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarketReport {
    Available(MarketRecommendation),
    Unavailable { market: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchAnalysis {
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub source: ProbabilitySource,
    pub market: Option<DeViggedMarket>,
    pub model: Option<PoissonPrediction>,
    /// Model distribution after Platt calibration and draw rules, when
    /// either applied
    pub calibrated_model: Option<Distribution>,
    pub draw_rule: Option<DrawRuleOutcome>,
    pub blend: Option<BlendResult>,
    /// Final outcome probabilities
    pub probabilities: Distribution,
    pub outcomes: Vec<OutcomeValue>,
    /// Outcome with the highest positive EV
    pub best_value: Option<String>,
    pub markets: Vec<MarketReport>,
    /// Highest-ranked available side market
    pub best_market: Option<MarketType>,
    pub warnings: Vec<String>,
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MatchAnalyzer {
    config: AnalyzerConfig,
}

/// Keep only `labels` from `dist` and renormalize (three-way model against a
/// two-way market).
fn restrict(dist: &Distribution, labels: &[&str]) -> Result<Distribution> {
    Distribution::from_pairs(
        labels
            .iter()
            .map(|l| (l.to_string(), dist.get(l).unwrap_or(0.0))),
    )
    .normalized()
}

impl MatchAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        Ok(MatchAnalyzer { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, input: &MatchInput) -> Result<MatchAnalysis> {
        let cfg = &self.config;
        let mut warnings = Vec::new();
        let fixture = match (&input.home, &input.away) {
            (Some(h), Some(a)) => format!("{} vs {}", h.name, a.name),
            _ => "fixture".to_string(),
        };

        // Market side
        let market = match &input.match_winner {
            Some(quote) => match devig_quote(quote, cfg.devig_method) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!("{}: match-winner market unusable, using model only: {}", fixture, e);
                    warnings.push(format!("market unavailable: {}", e));
                    None
                }
            },
            None => {
                warnings.push("market unavailable: no match-winner quote".to_string());
                None
            }
        };

        // Model side
        let model = match (&input.home, &input.away) {
            (Some(home), Some(away)) => match predict(home, away, &cfg.poisson) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("{}: goal model unusable, using market only: {}", fixture, e);
                    warnings.push(format!("model unavailable: {}", e));
                    None
                }
            },
            _ => {
                warnings.push("model unavailable: team form missing".to_string());
                None
            }
        };
        if model.is_some() {
            for team in [&input.home, &input.away].into_iter().flatten() {
                if team.is_thin() {
                    warnings.push(format!(
                        "{} form covers {} of {} matches",
                        team.name,
                        team.sample_size(),
                        team.recency_window
                    ));
                }
            }
        }

        let (calibrated_model, draw_rule) = match &model {
            Some(m) => self.adjust_model(m, input.draw_signals.as_ref(), &fixture, &mut warnings),
            None => (None, None),
        };
        let model_dist = calibrated_model
            .as_ref()
            .or(model.as_ref().map(|m| &m.distribution));

        // Combine
        let mut blend_result = None;
        let (source, probabilities) = match (&market, model_dist) {
            (Some(m), Some(d)) => {
                let labels = m.distribution.labels();
                let blended = restrict(d, &labels)
                    .and_then(|d| blend(&m.distribution, &d, &input.blend));
                match blended {
                    Ok(b) => {
                        let dist = b.distribution.clone();
                        blend_result = Some(b);
                        (ProbabilitySource::Blended, dist)
                    }
                    Err(e) => {
                        warn!("{}: blend failed, using market only: {}", fixture, e);
                        warnings.push(format!("blend skipped: {}", e));
                        (ProbabilitySource::MarketOnly, m.distribution.clone())
                    }
                }
            }
            (Some(m), None) => (ProbabilitySource::MarketOnly, m.distribution.clone()),
            (None, Some(d)) => (ProbabilitySource::ModelOnly, d.clone()),
            (None, None) => {
                return Err(EngineError::NoData(format!(
                    "{}: neither market odds nor team form are usable",
                    fixture
                )))
            }
        };

        // Price each outcome against the best available odds
        let legs: Vec<OutcomePrice> = match (&market, &input.match_winner) {
            (Some(_), Some(q)) => complete_legs(q)?,
            _ => Vec::new(),
        };
        let mut outcomes = Vec::with_capacity(probabilities.len());
        for o in &probabilities.outcomes {
            let leg = legs.iter().find(|l| l.label == o.label);
            let (ev, stake) = match leg {
                Some(l) => (
                    calculate_ev(cfg.reference_stake, l.odds, o.probability, &cfg.ev_thresholds)
                        .map_err(|e| warnings.push(format!("{} EV: {}", o.label, e)))
                        .ok(),
                    kelly(cfg.bankroll, l.odds, o.probability, &cfg.staking)
                        .map_err(|e| warnings.push(format!("{} stake: {}", o.label, e)))
                        .ok(),
                ),
                None => (None, None),
            };
            outcomes.push(OutcomeValue {
                label: o.label.clone(),
                probability: o.probability,
                odds: leg.map(|l| l.odds),
                bookmaker: leg.and_then(|l| l.bookmaker.clone()),
                ev,
                kelly: stake,
            });
        }
        let best_value = outcomes
            .iter()
            .filter_map(|o| o.ev.as_ref().filter(|e| e.is_positive_ev).map(|e| (o, e)))
            .max_by(|a, b| a.1.ev_percentage.total_cmp(&b.1.ev_percentage))
            .map(|(o, _)| o.label.clone());
        if let Some(label) = &best_value {
            info!("{}: best value on {}", fixture, label);
        }

        let markets = self.side_markets(input, &probabilities, &fixture);
        let best_market = rank_markets(markets.iter().filter_map(|m| match m {
            MarketReport::Available(r) => Some(r),
            MarketReport::Unavailable { .. } => None,
        }))
        .first()
        .map(|r| r.market);

        Ok(MatchAnalysis {
            home_team: input.home.as_ref().map(|t| t.name.clone()),
            away_team: input.away.as_ref().map(|t| t.name.clone()),
            source,
            market,
            model,
            calibrated_model,
            draw_rule,
            blend: blend_result,
            probabilities,
            outcomes,
            best_value,
            markets,
            best_market,
            warnings,
        })
    }

    /// Platt calibration, then draw rules, on the raw model distribution.
    /// Returns the adjusted distribution when either step applied.
    fn adjust_model(
        &self,
        model: &PoissonPrediction,
        signals: Option<&DrawSignals>,
        fixture: &str,
        warnings: &mut Vec<String>,
    ) -> (Option<Distribution>, Option<DrawRuleOutcome>) {
        let cfg = &self.config;
        let mut adjusted = None;
        if let Some(c) = cfg.calibration {
            match calibrate_distribution(&model.distribution, c) {
                Ok(d) => adjusted = Some(d),
                Err(e) => {
                    warn!("{}: calibration rejected, using raw model: {}", fixture, e);
                    warnings.push(format!("calibration skipped: {}", e));
                }
            }
        }

        let Some(signals) = signals else {
            return (adjusted, None);
        };
        let base = adjusted.as_ref().unwrap_or(&model.distribution);
        let result = draw_score(&model.expected_goals, signals, &cfg.draw_rule).and_then(|rule| {
            apply_draw_probability(base, rule.draw_probability).map(|d| (rule, d))
        });
        match result {
            Ok((rule, d)) => {
                info!(
                    "{}: draw rules scored {}, P(draw) set to {:.2}",
                    fixture, rule.score, rule.draw_probability
                );
                (Some(d), Some(rule))
            }
            Err(e) => {
                warn!("{}: draw rules skipped: {}", fixture, e);
                warnings.push(format!("draw rules skipped: {}", e));
                (adjusted, None)
            }
        }
    }

    /// Run each requested side market on its own; a failure becomes an
    /// `Unavailable` report.
    fn side_markets(
        &self,
        input: &MatchInput,
        final_probs: &Distribution,
        fixture: &str,
    ) -> Vec<MarketReport> {
        let cfg = &self.config;
        let mut reports = Vec::new();
        let mut report = |name: &str, result: Result<MarketRecommendation>| {
            reports.push(match result {
                Ok(r) => MarketReport::Available(r),
                Err(e) => {
                    warn!("{}: {} analysis unavailable: {}", fixture, name, e);
                    MarketReport::Unavailable {
                        market: name.to_string(),
                        reason: e.to_string(),
                    }
                }
            })
        };

        if let Some(quote) = &input.over_under {
            let result = match (&input.home, &input.away) {
                (Some(home), Some(away)) => analyze_over_under(
                    home,
                    away,
                    quote,
                    cfg.over_under_method,
                    &cfg.poisson,
                    &cfg.market_thresholds,
                ),
                _ => Err(EngineError::NoData("team form missing".into())),
            };
            report("over_under", result);
        }

        if let Some(btts) = &input.btts {
            report(
                "both_teams_to_score",
                analyze_btts(&btts.home, &btts.away, &btts.quote, &cfg.market_thresholds),
            );
        }

        if let Some(dnb) = &input.draw_no_bet {
            let result = match &input.match_winner {
                Some(mw) => dnb_probabilities(final_probs, input.draw_probability)
                    .and_then(|probs| analyze_dnb(dnb, mw, &probs, &cfg.market_thresholds)),
                None => Err(EngineError::NoData("match-winner quote missing".into())),
            };
            report("draw_no_bet", result);
        }

        reports
    }
}

/// Final probabilities with the draw optionally replaced by a caller estimate.
fn dnb_probabilities(final_probs: &Distribution, draw: Option<f64>) -> Result<Distribution> {
    let Some(draw) = draw else {
        return Ok(final_probs.clone());
    };
    let draw = check_probability(draw)?;
    Ok(Distribution::from_pairs(final_probs.outcomes.iter().map(|o| {
        let p = if o.label == "draw" { draw } else { o.probability };
        (o.label.clone(), p)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketType, RecommendationTier};
    use approx::assert_relative_eq;

    fn forms() -> (TeamForm, TeamForm) {
        (
            TeamForm::new("Home", 1.8, 1.2, 10),
            TeamForm::new("Away", 1.5, 1.3, 10),
        )
    }

    fn match_winner(home: f64, draw: f64, away: f64) -> MarketQuote {
        MarketQuote::new(
            MarketType::MatchWinner,
            vec![
                OutcomePrice::new("home", home),
                OutcomePrice::new("draw", draw),
                OutcomePrice::new("away", away),
            ],
        )
    }

    fn full_input() -> MatchInput {
        let (home, away) = forms();
        MatchInput {
            home: Some(home),
            away: Some(away),
            match_winner: Some(match_winner(2.10, 3.40, 3.60)),
            over_under: Some(MarketQuote::new(
                MarketType::OverUnder { line: 2.5 },
                vec![OutcomePrice::new("over", 1.90), OutcomePrice::new("under", 1.90)],
            )),
            btts: Some(BttsInput {
                quote: MarketQuote::new(
                    MarketType::BothTeamsToScore,
                    vec![OutcomePrice::new("yes", 1.80), OutcomePrice::new("no", 2.00)],
                ),
                home: ScoringProfile {
                    scored_in: 0.75,
                    conceded_in: Some(0.70),
                    btts_rate: 0.60,
                },
                away: ScoringProfile {
                    scored_in: 0.70,
                    conceded_in: Some(0.65),
                    btts_rate: 0.55,
                },
            }),
            draw_no_bet: Some(MarketQuote::new(
                MarketType::DrawNoBet,
                vec![OutcomePrice::new("home", 1.55), OutcomePrice::new("away", 2.60)],
            )),
            ..Default::default()
        }
    }

    #[test]
    fn analyzer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MatchAnalyzer>();
        assert_send_sync::<MatchAnalysis>();
        assert_send_sync::<MatchInput>();
    }

    #[test]
    fn full_fixture_is_blended_and_priced() {
        let a = MatchAnalyzer::default().analyze(&full_input()).unwrap();
        assert_eq!(a.source, ProbabilitySource::Blended);
        assert_relative_eq!(a.probabilities.sum(), 1.0, epsilon = 1e-9);
        assert_eq!(a.outcomes.len(), 3);
        assert!(a.outcomes.iter().all(|o| o.ev.is_some() && o.kelly.is_some()));
        assert_eq!(a.markets.len(), 3);
        assert!(a
            .markets
            .iter()
            .all(|m| matches!(m, MarketReport::Available(_))));

        let blend = a.blend.as_ref().unwrap();
        let market = a.market.as_ref().unwrap();
        for ((pm, pf), cap) in market
            .distribution
            .probabilities()
            .iter()
            .zip(a.probabilities.probabilities())
            .zip(&blend.caps)
        {
            assert!((pf - pm).abs() <= cap + 1e-9);
        }
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn missing_form_falls_back_to_market() {
        let mut input = full_input();
        input.home = Some(TeamForm::new("Home", 1.8, 1.2, 0));
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert_eq!(a.source, ProbabilitySource::MarketOnly);
        assert!(a.model.is_none());
        assert!(!a.warnings.is_empty());
        // Over/under needs form; the other markets still run
        assert!(matches!(
            &a.markets[0],
            MarketReport::Unavailable { market, .. } if market == "over_under"
        ));
        assert!(matches!(&a.markets[1], MarketReport::Available(_)));
        assert!(matches!(&a.markets[2], MarketReport::Available(_)));
    }

    #[test]
    fn broken_market_falls_back_to_model() {
        let mut input = full_input();
        input.match_winner = Some(match_winner(1.0, 3.4, 3.6));
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert_eq!(a.source, ProbabilitySource::ModelOnly);
        assert!(a.outcomes.iter().all(|o| o.odds.is_none() && o.ev.is_none()));
        let model = a.model.as_ref().unwrap();
        assert_relative_eq!(
            a.probabilities.get("home").unwrap(),
            model.distribution.get("home").unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn nothing_usable_is_no_data() {
        let input = MatchInput::default();
        assert!(matches!(
            MatchAnalyzer::default().analyze(&input),
            Err(EngineError::NoData(_))
        ));
    }

    #[test]
    fn two_way_market_blends_against_projected_model() {
        let (home, away) = forms();
        let input = MatchInput {
            home: Some(home),
            away: Some(away),
            match_winner: Some(MarketQuote::new(
                MarketType::MatchWinner,
                vec![OutcomePrice::new("home", 1.70), OutcomePrice::new("away", 2.20)],
            )),
            ..Default::default()
        };
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert_eq!(a.source, ProbabilitySource::Blended);
        assert_eq!(a.probabilities.labels(), vec!["home", "away"]);
        assert_relative_eq!(a.blend.unwrap().caps[0], 0.12, epsilon = 1e-12);
    }

    #[test]
    fn calibration_is_applied_before_blending() {
        let config = AnalyzerConfig {
            calibration: Some(PlattCalibration { a: 0.5, b: 0.0 }),
            ..Default::default()
        };
        let analyzer = MatchAnalyzer::new(config).unwrap();
        let a = analyzer.analyze(&full_input()).unwrap();
        let raw = a.model.as_ref().unwrap().distribution.get("home").unwrap();
        let calibrated = a.calibrated_model.as_ref().unwrap().get("home").unwrap();
        assert!(calibrated < raw);
    }

    #[test]
    fn draw_rules_pin_the_model_draw() {
        let mut input = full_input();
        input.draw_signals = Some(DrawSignals {
            home_possession: Some(50.0),
            away_possession: Some(48.0),
            home_shots_on_target: Some(5.0),
            away_shots_on_target: Some(4.0),
            h2h_draw_rate: Some(0.5),
            home_position: Some(8),
            away_position: Some(12),
        });
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        // xG 1.84 vs 1.43 is neither close nor low-scoring: 3 + 3 + 2 + 2
        let rule = a.draw_rule.as_ref().unwrap();
        assert_eq!(rule.score, 10);
        assert_relative_eq!(rule.draw_probability, 0.15, epsilon = 1e-12);

        let raw = &a.model.as_ref().unwrap().distribution;
        let adjusted = a.calibrated_model.as_ref().unwrap();
        assert_relative_eq!(adjusted.get("draw").unwrap(), 0.15, epsilon = 1e-12);
        assert_relative_eq!(adjusted.sum(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            adjusted.get("home").unwrap() / adjusted.get("away").unwrap(),
            raw.get("home").unwrap() / raw.get("away").unwrap(),
            epsilon = 1e-9
        );
        assert_eq!(a.source, ProbabilitySource::Blended);
    }

    #[test]
    fn invalid_draw_signals_are_skipped() {
        let mut input = full_input();
        input.match_winner = None;
        input.draw_no_bet = None;
        input.draw_signals = Some(DrawSignals {
            h2h_draw_rate: Some(2.0),
            ..Default::default()
        });
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert!(a.draw_rule.is_none());
        assert!(a.warnings.iter().any(|w| w.starts_with("draw rules skipped")));
    }

    #[test]
    fn best_market_is_the_top_ranked_report() {
        let a = MatchAnalyzer::default().analyze(&full_input()).unwrap();
        let available: Vec<&MarketRecommendation> = a
            .markets
            .iter()
            .filter_map(|m| match m {
                MarketReport::Available(r) => Some(r),
                MarketReport::Unavailable { .. } => None,
            })
            .collect();
        let best = available
            .iter()
            .find(|r| Some(r.market) == a.best_market)
            .unwrap();
        for r in &available {
            assert!(
                best.confidence > r.confidence
                    || (best.confidence == r.confidence && best.tier >= r.tier)
            );
        }
    }

    #[test]
    fn thin_form_is_flagged() {
        let mut input = full_input();
        input.home = Some(TeamForm::new("Home", 1.8, 1.2, 4));
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert_eq!(a.source, ProbabilitySource::Blended);
        assert!(a.warnings.iter().any(|w| w == "Home form covers 4 of 10 matches"));
    }

    #[test]
    fn failed_side_market_does_not_block_others() {
        let mut input = full_input();
        input.draw_no_bet = Some(MarketQuote::new(
            MarketType::DrawNoBet,
            vec![OutcomePrice::new("home", 1.55)],
        ));
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert!(matches!(
            &a.markets[2],
            MarketReport::Unavailable { market, .. } if market == "draw_no_bet"
        ));
        assert!(matches!(&a.markets[0], MarketReport::Available(_)));
        assert!(matches!(
            &a.markets[1],
            MarketReport::Available(r) if r.tier >= RecommendationTier::Fair
        ));
        assert_ne!(a.best_market, Some(MarketType::DrawNoBet));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AnalyzerConfig {
            bankroll: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            MatchAnalyzer::new(config),
            Err(EngineError::InvalidConfig { field: "bankroll", .. })
        ));
    }

    #[test]
    fn input_deserializes_with_defaults() {
        let json = r#"{
            "home": {"name": "Home", "attack": 1.8, "defense": 1.2, "matches_played": 10},
            "away": {"name": "Away", "attack": 1.5, "defense": 1.3, "matches_played": 10},
            "match_winner": {
                "market": {"type": "match_winner"},
                "prices": [
                    {"label": "home", "odds": 2.1, "bookmaker": "A"},
                    {"label": "draw", "odds": 3.4, "bookmaker": "A"},
                    {"label": "away", "odds": 3.6, "bookmaker": null}
                ]
            },
            "blend": {"proximity": 0.9}
        }"#;
        let input: MatchInput = serde_json::from_str(json).unwrap();
        assert_relative_eq!(input.blend.proximity, 0.9, epsilon = 1e-12);
        assert_relative_eq!(input.home.as_ref().unwrap().home_advantage, 1.10, epsilon = 1e-12);
        let a = MatchAnalyzer::default().analyze(&input).unwrap();
        assert_eq!(a.source, ProbabilitySource::Blended);
        assert!(serde_json::to_string(&a).unwrap().contains("\"source\":\"blended\""));
    }
}
