//! Single-bet returns, accumulators and each-way bets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tracing::debug;

use crate::engine::ev::{calculate_ev, EvThresholds};
use crate::engine::odds::to_decimal;
use crate::error::{check_probability, check_stake, EngineError, Result};
use crate::models::{
    AccumulatorLeg, AccumulatorResult, BetCalculation, EachWayResult, MultipleBetChoice,
    MultipleBetScenarios, Odds, OddsFormat, SingleBet,
};

// ── Accumulator recommendation limits ────────────────────────────────────────

const ACCA_MIN_WIN_PROBABILITY: f64 = 0.30;
const ACCA_MAX_LEGS: usize = 5;
const ACCA_MAX_TOTAL_ODDS: f64 = 20.0;

/// Return and profit for a single bet, with commission taken from winnings.
pub fn calculate_bet_return(
    stake: f64,
    odds: f64,
    format: OddsFormat,
    commission_rate: f64,
) -> Result<BetCalculation> {
    let stake = check_stake(stake)?;
    if !(0.0..1.0).contains(&commission_rate) {
        return Err(EngineError::InvalidConfig {
            field: "commission_rate",
            reason: format!("{} is outside [0, 1)", commission_rate),
        });
    }
    let decimal = to_decimal(odds, format)?;

    let gross_profit = stake * decimal.net();
    let commission = gross_profit * commission_rate;
    let potential_profit = gross_profit - commission;

    Ok(BetCalculation {
        stake,
        odds: decimal.decimal(),
        original_odds: odds,
        odds_format: format,
        potential_return: stake + potential_profit,
        potential_profit,
        commission,
        implied_probability: decimal.implied_probability(),
    })
}

/// Combine legs into one accumulator (parlay). Leg probabilities default to
/// the implied probability of the leg's odds.
pub fn calculate_accumulator(legs: &[AccumulatorLeg], stake: f64) -> Result<AccumulatorResult> {
    let stake = check_stake(stake)?;
    if legs.is_empty() {
        return Err(EngineError::NoData("accumulator needs at least one leg".into()));
    }

    let mut total_odds = 1.0;
    let mut win_probability = 1.0;
    for leg in legs {
        let odds = Odds::new(leg.odds)?;
        let p = match leg.probability {
            Some(p) => check_probability(p)?,
            None => odds.implied_probability(),
        };
        total_odds *= odds.decimal();
        win_probability *= p;
    }

    let potential_return = stake * total_odds;
    Ok(AccumulatorResult {
        total_odds,
        stake,
        potential_return,
        potential_profit: potential_return - stake,
        win_probability,
        expected_value: win_probability * potential_return - stake,
        is_recommended: win_probability > ACCA_MIN_WIN_PROBABILITY
            && legs.len() <= ACCA_MAX_LEGS
            && total_odds <= ACCA_MAX_TOTAL_ODDS,
    })
}

/// Price the selections both ways: each as a single at its own stake, and
/// all together as one accumulator staked with the combined total. Singles
/// are preferred only when their summed EV is strictly higher.
pub fn compare_singles_and_accumulator(
    bets: &[SingleBet],
    thresholds: &EvThresholds,
) -> Result<MultipleBetScenarios> {
    if bets.is_empty() {
        return Err(EngineError::NoData("no bets to compare".into()));
    }

    let mut singles = Vec::with_capacity(bets.len());
    let mut legs = Vec::with_capacity(bets.len());
    for bet in bets {
        let p = match bet.probability {
            Some(p) => p,
            None => Odds::new(bet.odds)?.implied_probability(),
        };
        singles.push(calculate_ev(bet.stake, bet.odds, p, thresholds)?);
        legs.push(AccumulatorLeg {
            selection: bet.selection.clone(),
            odds: bet.odds,
            probability: Some(p),
        });
    }
    let total_stake: f64 = bets.iter().map(|b| b.stake).sum();
    let singles_total_ev: f64 = singles.iter().map(|s| s.expected_value).sum();
    let accumulator = calculate_accumulator(&legs, total_stake)?;

    let recommendation = if singles_total_ev > accumulator.expected_value {
        MultipleBetChoice::Singles
    } else {
        MultipleBetChoice::Accumulator
    };
    debug!(
        "{} selections: singles EV {:.2}, accumulator EV {:.2} -> {:?}",
        bets.len(),
        singles_total_ev,
        accumulator.expected_value,
        recommendation
    );

    Ok(MultipleBetScenarios {
        total_stake,
        singles,
        singles_total_ev,
        accumulator,
        recommendation,
    })
}

/// Each-way place terms, written like `"1/4 1-2-3"`: a fraction of the win
/// odds paid for a place, followed by the paying positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaceTerms {
    pub fraction: f64,
    pub places: u32,
}

impl Default for PlaceTerms {
    fn default() -> Self {
        PlaceTerms {
            fraction: 0.25,
            places: 3,
        }
    }
}

impl FromStr for PlaceTerms {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: String| EngineError::InvalidConfig {
            field: "place_terms",
            reason,
        };
        let mut parts = s.split_whitespace();
        let Some(fraction) = parts.next() else {
            return Ok(PlaceTerms::default());
        };

        let fraction = match fraction.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num
                    .parse()
                    .map_err(|_| invalid(format!("bad numerator in '{}'", fraction)))?;
                let den: f64 = den
                    .parse()
                    .map_err(|_| invalid(format!("bad denominator in '{}'", fraction)))?;
                num / den
            }
            None => fraction
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a fraction", fraction)))?,
        };
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid(format!("place fraction {} is outside (0, 1]", fraction)));
        }

        let places = match parts.next() {
            Some(positions) => {
                let positions = positions
                    .split('-')
                    .map(|p| p.parse::<u32>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| invalid(format!("bad place positions '{}'", positions)))?;
                positions.into_iter().max().unwrap_or(0)
            }
            None => PlaceTerms::default().places,
        };
        if places == 0 {
            return Err(invalid("at least one paying place is required".into()));
        }

        Ok(PlaceTerms { fraction, places })
    }
}

/// Each-way bet: `stake` on the win part and the same again on the place
/// part, so the total outlay is twice the unit stake.
pub fn calculate_each_way(stake: f64, win_odds: f64, terms: &str) -> Result<EachWayResult> {
    let stake = check_stake(stake)?;
    let win = Odds::new(win_odds)?;
    let terms: PlaceTerms = terms.parse()?;

    let place_odds = 1.0 + win.net() * terms.fraction;
    let total_stake = stake * 2.0;
    let win_return = stake * win.decimal();
    let place_return = stake * place_odds;

    Ok(EachWayResult {
        total_stake,
        win_odds: win.decimal(),
        place_odds,
        place_fraction: terms.fraction,
        places: terms.places,
        win_and_place_return: win_return + place_return,
        win_and_place_profit: win_return + place_return - total_stake,
        place_only_return: place_return,
        place_only_profit: place_return - total_stake,
        loss: -total_stake,
    })
}
