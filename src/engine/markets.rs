//! Market-specific analyzers: Over/Under goals, Both Teams To Score and
//! Draw No Bet. Each turns team statistics plus a quote into a
//! `MarketRecommendation` with its reasoning spelled out.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::devig::complete_legs;
use crate::engine::poisson::{expected_goals, PoissonConfig, ScoreGrid};
use crate::error::{check_probability, EngineError, Result};
use crate::models::{
    Distribution, MarketQuote, MarketRecommendation, MarketType, OutcomePrice, RecommendationTier,
    RiskLevel, ScoringProfile, TeamForm,
};

// ── Configuration ────────────────────────────────────────────────────────────

/// How the Over/Under analyzer estimates P(over).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OverUnderMethod {
    /// Piecewise-linear heuristic on `expected_total − line`
    #[default]
    MarginHeuristic,
    /// Σ P(i + j > line) over the Poisson score grid
    ScoreGrid,
}

/// Decision thresholds for the market analyzers. EVs are per unit staked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketThresholds {
    pub ou_min_ev: f64,
    pub ou_min_probability: f64,
    /// Expected total this close to the line is too close to call
    pub ou_avoid_margin: f64,
    /// Expected total this far from the line counts as a statistical edge
    pub ou_edge_margin: f64,

    pub btts_strong_ev: f64,
    pub btts_good_ev: f64,
    pub btts_strong_yes_probability: f64,
    pub btts_good_yes_probability: f64,
    pub btts_strong_no_probability: f64,
    pub btts_good_no_probability: f64,

    /// Quoted minus fair DNB odds needed to call a price value
    pub dnb_min_value: f64,
    pub dnb_home_min_win: f64,
    pub dnb_away_min_win: f64,
    pub dnb_high_draw: f64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        MarketThresholds {
            ou_min_ev: 0.05,
            ou_min_probability: 0.55,
            ou_avoid_margin: 0.2,
            ou_edge_margin: 0.3,
            btts_strong_ev: 0.08,
            btts_good_ev: 0.03,
            btts_strong_yes_probability: 0.60,
            btts_good_yes_probability: 0.55,
            btts_strong_no_probability: 0.40,
            btts_good_no_probability: 0.45,
            dnb_min_value: 0.15,
            dnb_home_min_win: 0.45,
            dnb_away_min_win: 0.35,
            dnb_high_draw: 0.30,
        }
    }
}

/// Heuristic over-probability bounds.
const OVER_FLOOR: f64 = 0.20;
const OVER_CEILING: f64 = 0.85;

fn expect_market(quote: &MarketQuote, expected: &str, ok: bool) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(EngineError::IncompleteMarket {
            reason: format!("expected a {} quote, got {:?}", expected, quote.market),
        })
    }
}

fn leg<'a>(legs: &'a [OutcomePrice], label: &str) -> Result<&'a OutcomePrice> {
    legs.iter()
        .find(|l| l.label == label)
        .ok_or_else(|| EngineError::IncompleteMarket {
            reason: format!("missing '{}' leg", label),
        })
}

// ── Over/Under ───────────────────────────────────────────────────────────────

/// Mean of the simple (`attack_h + attack_a`) and defense-adjusted totals.
pub fn expected_total_goals(home: &TeamForm, away: &TeamForm) -> f64 {
    let simple = home.attack + away.attack;
    let adjusted = (home.attack + away.defense) / 2.0 + (away.attack + home.defense) / 2.0;
    (simple + adjusted) / 2.0
}

/// Piecewise-linear P(over) from `margin = expected_total − line`.
/// Non-decreasing in `margin` and clamped to [0.20, 0.85].
pub fn over_probability_heuristic(margin: f64) -> f64 {
    let p = if margin > 0.5 {
        0.60 + margin * 0.08
    } else if margin > 0.0 {
        0.55 + margin * 0.10
    } else if margin > -0.5 {
        0.45 + margin * 0.10
    } else {
        0.40 + margin * 0.08
    };
    p.clamp(OVER_FLOOR, OVER_CEILING)
}

pub fn analyze_over_under(
    home: &TeamForm,
    away: &TeamForm,
    quote: &MarketQuote,
    method: OverUnderMethod,
    poisson: &PoissonConfig,
    thresholds: &MarketThresholds,
) -> Result<MarketRecommendation> {
    let MarketType::OverUnder { line } = quote.market else {
        return Err(EngineError::IncompleteMarket {
            reason: format!("expected an over/under quote, got {:?}", quote.market),
        });
    };
    home.validate()?;
    away.validate()?;
    let legs = complete_legs(quote)?;
    let over_odds = leg(&legs, "over")?.odds;
    let under_odds = leg(&legs, "under")?.odds;

    let (expected_total, p_over) = match method {
        OverUnderMethod::MarginHeuristic => {
            let total = expected_total_goals(home, away);
            (total, over_probability_heuristic(total - line))
        }
        OverUnderMethod::ScoreGrid => {
            let xg = expected_goals(home, away)?;
            let grid = ScoreGrid::new(xg.home, xg.away, poisson.max_goals)?;
            (xg.total(), grid.prob_total_over(line)?)
        }
    };
    let p_under = 1.0 - p_over;
    let over_ev = p_over * over_odds - 1.0;
    let under_ev = p_under * under_odds - 1.0;
    debug!(
        "O/U {} via {:?}: expected {:.2}, P(over) {:.3}, EV over {:+.3} under {:+.3}",
        line, method, expected_total, p_over, over_ev, under_ev
    );

    let mut reasoning = vec![
        format!(
            "{} average {:.1} scored and {:.1} conceded per match",
            home.name, home.attack, home.defense
        ),
        format!(
            "{} average {:.1} scored and {:.1} conceded per match",
            away.name, away.attack, away.defense
        ),
        format!("Expected total goals {:.2} against line {}", expected_total, line),
    ];
    if expected_total > line + thresholds.ou_edge_margin {
        reasoning.push(format!("Statistical edge towards over {}", line));
    } else if expected_total < line - thresholds.ou_edge_margin {
        reasoning.push(format!("Statistical edge towards under {}", line));
    } else {
        reasoning.push("Borderline: expected goals sit close to the line".to_string());
    }

    let pick = if over_ev > thresholds.ou_min_ev && p_over > thresholds.ou_min_probability {
        Some(("over", p_over, over_ev, over_odds))
    } else if under_ev > thresholds.ou_min_ev && p_under > thresholds.ou_min_probability {
        Some(("under", p_under, under_ev, under_odds))
    } else {
        None
    };

    let rec = match pick {
        Some((selection, p, ev, odds)) => {
            reasoning.push(format!(
                "Back {} {} at {:.2}: probability {:.1}%, EV {:+.1}%",
                selection,
                line,
                odds,
                p * 100.0,
                ev * 100.0
            ));
            MarketRecommendation {
                market: quote.market,
                selection: Some(selection.to_string()),
                probability: p,
                expected_value: ev,
                tier: RecommendationTier::Good,
                confidence: 0.75,
                suggested_stake_pct: 2.0,
                risk_level: RiskLevel::Moderate,
                reasoning,
            }
        }
        None => {
            let too_close = (expected_total - line).abs() < thresholds.ou_avoid_margin;
            reasoning.push(if too_close {
                "Avoid: too close to call, look at markets with a clearer edge".to_string()
            } else {
                "Marginal: slight edge but not enough confidence to recommend".to_string()
            });
            MarketRecommendation {
                market: quote.market,
                selection: None,
                probability: p_over,
                expected_value: over_ev.max(under_ev),
                tier: if too_close {
                    RecommendationTier::Poor
                } else {
                    RecommendationTier::Fair
                },
                confidence: 0.60,
                suggested_stake_pct: 0.0,
                risk_level: RiskLevel::Moderate,
                reasoning,
            }
        }
    };
    Ok(rec)
}

// ── Both Teams To Score ──────────────────────────────────────────────────────

/// Weighted BTTS estimate: 60% attack/defense term, 40% historical rate.
pub fn btts_probability(home: &ScoringProfile, away: &ScoringProfile) -> f64 {
    let attack = home.scored_in * away.scored_in;
    let term = match (home.conceded_in, away.conceded_in) {
        (Some(h), Some(a)) => (attack + h * a) / 2.0,
        _ => attack,
    };
    let historical = (home.btts_rate + away.btts_rate) / 2.0;
    0.6 * term + 0.4 * historical
}

pub fn analyze_btts(
    home: &ScoringProfile,
    away: &ScoringProfile,
    quote: &MarketQuote,
    thresholds: &MarketThresholds,
) -> Result<MarketRecommendation> {
    expect_market(quote, "BTTS", quote.market == MarketType::BothTeamsToScore)?;
    home.validate()?;
    away.validate()?;
    let legs = complete_legs(quote)?;
    let yes_odds = leg(&legs, "yes")?.odds;
    let no_odds = leg(&legs, "no")?.odds;

    let p = btts_probability(home, away);
    let yes_ev = p * yes_odds - 1.0;
    let no_ev = (1.0 - p) * no_odds - 1.0;

    let mut reasoning = Vec::new();
    for (side, profile) in [("Home", home), ("Away", away)] {
        let mut line = format!(
            "{} side scores in {:.0}% of matches",
            side,
            profile.scored_in * 100.0
        );
        if let Some(c) = profile.conceded_in {
            line.push_str(&format!(", concedes in {:.0}%", c * 100.0));
        }
        reasoning.push(line);
    }
    reasoning.push(format!(
        "Historical BTTS rate: home {:.0}%, away {:.0}%",
        home.btts_rate * 100.0,
        away.btts_rate * 100.0
    ));
    reasoning.push(format!("Estimated BTTS probability {:.1}%", p * 100.0));

    let t = thresholds;
    let strong_yes = yes_ev > t.btts_strong_ev && p > t.btts_strong_yes_probability;
    let (selection, tier, confidence) = if strong_yes {
        (Some("yes"), RecommendationTier::Excellent, 0.85)
    } else if yes_ev > t.btts_good_ev && p > t.btts_good_yes_probability {
        (Some("yes"), RecommendationTier::Good, 0.75)
    } else if no_ev > t.btts_strong_ev && p < t.btts_strong_no_probability {
        (Some("no"), RecommendationTier::Excellent, 0.85)
    } else if no_ev > t.btts_good_ev && p < t.btts_good_no_probability {
        (Some("no"), RecommendationTier::Good, 0.75)
    } else {
        (None, RecommendationTier::Fair, 0.60)
    };

    let (probability, expected_value) = match selection {
        Some("yes") => (p, yes_ev),
        Some(_) => (1.0 - p, no_ev),
        None => (p, yes_ev.max(no_ev)),
    };
    reasoning.push(match selection {
        Some(s) => format!("Back BTTS {}: EV {:+.1}%", s, expected_value * 100.0),
        None => format!("No strong value in BTTS (best EV {:+.1}%)", expected_value * 100.0),
    });

    Ok(MarketRecommendation {
        market: quote.market,
        selection: selection.map(str::to_string),
        probability,
        expected_value,
        tier,
        confidence,
        suggested_stake_pct: match selection {
            Some(_) if confidence > 0.80 => 2.0,
            Some(_) => 1.0,
            None => 0.0,
        },
        risk_level: RiskLevel::Moderate,
        reasoning,
    })
}

// ── Draw No Bet ──────────────────────────────────────────────────────────────

/// Fair DNB price implied by a match-winner price and the draw probability.
pub fn fair_dnb_odds(match_winner_odds: f64, p_draw: f64) -> f64 {
    match_winner_odds / (1.0 - p_draw)
}

/// Compare quoted DNB prices against fair prices derived from the
/// match-winner market. `probabilities` must carry home/draw/away.
pub fn analyze_dnb(
    dnb: &MarketQuote,
    match_winner: &MarketQuote,
    probabilities: &Distribution,
    thresholds: &MarketThresholds,
) -> Result<MarketRecommendation> {
    expect_market(dnb, "draw-no-bet", dnb.market == MarketType::DrawNoBet)?;
    expect_market(
        match_winner,
        "match-winner",
        match_winner.market == MarketType::MatchWinner,
    )?;
    let dnb_legs = complete_legs(dnb)?;
    let mw_legs = complete_legs(match_winner)?;
    if mw_legs.len() != 3 {
        return Err(EngineError::IncompleteMarket {
            reason: "draw-no-bet needs a three-way match-winner quote".into(),
        });
    }

    let prob = |label: &str| {
        probabilities
            .get(label)
            .ok_or_else(|| EngineError::IncompleteMarket {
                reason: format!("no '{}' probability for draw-no-bet", label),
            })
    };
    let p_draw = check_probability(prob("draw")?)?;
    if p_draw >= 1.0 {
        return Err(EngineError::InvalidProbability { value: p_draw });
    }
    let p_home = prob("home")?;
    let p_away = prob("away")?;

    let home_odds = leg(&dnb_legs, "home")?.odds;
    let away_odds = leg(&dnb_legs, "away")?.odds;
    let fair_home = fair_dnb_odds(leg(&mw_legs, "home")?.odds, p_draw);
    let fair_away = fair_dnb_odds(leg(&mw_legs, "away")?.odds, p_draw);
    let home_value = home_odds - fair_home;
    let away_value = away_odds - fair_away;

    let mut reasoning = vec![
        format!("Draw probability {:.1}%", p_draw * 100.0),
        format!("Quoted DNB odds: home {:.2}, away {:.2}", home_odds, away_odds),
        format!("Fair DNB odds: home {:.2}, away {:.2}", fair_home, fair_away),
    ];
    if home_value > thresholds.dnb_min_value {
        reasoning.push(format!("Home DNB offers value ({:+.2})", home_value));
    } else if away_value > thresholds.dnb_min_value {
        reasoning.push(format!("Away DNB offers value ({:+.2})", away_value));
    }
    let high_draw = p_draw > thresholds.dnb_high_draw;
    if high_draw {
        reasoning.push("High draw probability makes the draw refund attractive".to_string());
    }

    let t = thresholds;
    let home_pick = home_value > t.dnb_min_value && p_home > t.dnb_home_min_win;
    let (selection, tier, confidence) = if home_pick {
        (Some("home"), RecommendationTier::Excellent, 0.80)
    } else if away_value > t.dnb_min_value && p_away > t.dnb_away_min_win {
        (Some("away"), RecommendationTier::Good, 0.75)
    } else if high_draw {
        let best = if home_value > away_value { "home" } else { "away" };
        (Some(best), RecommendationTier::Good, 0.70)
    } else {
        (None, RecommendationTier::Fair, 0.60)
    };

    // Outcome probability with the draw refunded
    let settled = 1.0 - p_draw;
    let ev_home = p_home / settled * home_odds - 1.0;
    let ev_away = p_away / settled * away_odds - 1.0;
    let (probability, expected_value) = match selection {
        Some("home") => (p_home / settled, ev_home),
        Some(_) => (p_away / settled, ev_away),
        None => (p_home / settled, ev_home.max(ev_away)),
    };
    reasoning.push(match selection {
        Some(s) => format!("Back {} draw-no-bet", s),
        None => "Match-winner prices may offer better value than draw-no-bet".to_string(),
    });

    Ok(MarketRecommendation {
        market: dnb.market,
        selection: selection.map(str::to_string),
        probability,
        expected_value,
        tier,
        confidence,
        suggested_stake_pct: match selection {
            Some(_) if confidence > 0.75 => 2.0,
            Some(_) => 1.5,
            None => 0.0,
        },
        risk_level: if high_draw {
            RiskLevel::Low
        } else {
            RiskLevel::Moderate
        },
        reasoning,
    })
}

// ── Comparison ───────────────────────────────────────────────────────────────

/// Order market recommendations best first: by confidence, then by tier.
/// Ties keep their input order.
pub fn rank_markets<'a>(
    recommendations: impl IntoIterator<Item = &'a MarketRecommendation>,
) -> Vec<&'a MarketRecommendation> {
    let mut ranked: Vec<_> = recommendations.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.tier.cmp(&a.tier))
    });
    ranked
}
