//! Arbitrage detection and dutching allocation.
//!
//! Both split a total stake in proportion to each leg's implied probability,
//! `stake_i = total · (1/o_i) / Σ(1/o_j)`, so every leg pays out the same
//! amount. An arbitrage exists when the legs' overround is below 1.

use tracing::{debug, info};

use crate::engine::devig::complete_legs;
use crate::error::{check_stake, EngineError, Result};
use crate::models::{ArbitrageResult, DutchingResult, LegStake, MarketQuote, Odds, OutcomePrice};

fn inverse_sum(legs: &[OutcomePrice]) -> Result<f64> {
    legs.iter()
        .map(|l| Odds::new(l.odds).map(|o| o.implied_probability()))
        .sum()
}

/// Equal-payout allocation of `total` across `legs`.
fn allocate(legs: &[OutcomePrice], total: f64, overround: f64) -> Vec<LegStake> {
    legs.iter()
        .map(|l| {
            let stake = total / overround / l.odds;
            LegStake {
                label: l.label.clone(),
                odds: l.odds,
                bookmaker: l.bookmaker.clone(),
                stake,
                payout: stake * l.odds,
            }
        })
        .collect()
}

/// Check a set of legs (one per outcome, typically the best price across
/// bookmakers) for an arbitrage. "No arbitrage" is a normal result.
pub fn detect(legs: &[OutcomePrice], total_stake: Option<f64>) -> Result<ArbitrageResult> {
    if legs.len() < 2 {
        return Err(EngineError::IncompleteMarket {
            reason: format!("arbitrage needs at least two outcomes, got {}", legs.len()),
        });
    }
    let total_stake = total_stake.map(check_stake).transpose()?;
    let overround = inverse_sum(legs)?;
    let is_arbitrage = overround < 1.0;

    if !is_arbitrage {
        debug!("No arbitrage: overround {:.4}", overround);
        return Ok(ArbitrageResult {
            overround,
            is_arbitrage,
            profit_percentage: 0.0,
            total_stake,
            legs: Vec::new(),
            guaranteed_return: None,
            guaranteed_profit: None,
        });
    }

    let profit_percentage = 100.0 * (1.0 - overround);
    info!(
        "Arbitrage found across {} legs: overround {:.4}, profit {:.2}%",
        legs.len(),
        overround,
        profit_percentage
    );

    let (stakes, guaranteed_return) = match total_stake {
        Some(total) => {
            let stakes = allocate(legs, total, overround);
            let min_payout = stakes
                .iter()
                .map(|s| s.payout)
                .fold(f64::INFINITY, f64::min);
            (stakes, Some(min_payout))
        }
        None => (Vec::new(), None),
    };

    Ok(ArbitrageResult {
        overround,
        is_arbitrage,
        profit_percentage,
        total_stake,
        legs: stakes,
        guaranteed_return,
        guaranteed_profit: guaranteed_return.zip(total_stake).map(|(r, t)| r - t),
    })
}

/// Two-way arbitrage check on a pair of prices.
pub fn two_way(odds_1: f64, odds_2: f64, total_stake: Option<f64>) -> Result<ArbitrageResult> {
    detect(
        &[
            OutcomePrice::new("outcome_1", odds_1),
            OutcomePrice::new("outcome_2", odds_2),
        ],
        total_stake,
    )
}

/// Arbitrage check on the best price per outcome of a multi-bookmaker quote.
pub fn detect_quote(quote: &MarketQuote, total_stake: Option<f64>) -> Result<ArbitrageResult> {
    let legs = complete_legs(quote)?;
    detect(&legs, total_stake)
}

/// Spread `total_stake` over the selections so each returns the same amount.
pub fn dutch(selections: &[OutcomePrice], total_stake: f64) -> Result<DutchingResult> {
    if selections.len() < 2 {
        return Err(EngineError::IncompleteMarket {
            reason: format!("dutching needs at least two selections, got {}", selections.len()),
        });
    }
    let total_stake = check_stake(total_stake)?;
    let overround = inverse_sum(selections)?;
    let legs = allocate(selections, total_stake, overround);
    let expected_return = total_stake / overround;
    let expected_profit = expected_return - total_stake;

    Ok(DutchingResult {
        total_stake,
        expected_return,
        expected_profit,
        legs,
        is_profitable: expected_profit > 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketType;
    use approx::assert_relative_eq;

    #[test]
    fn two_way_arbitrage_example() {
        let r = two_way(2.10, 2.05, Some(100.0)).unwrap();
        assert!(r.is_arbitrage);
        assert_relative_eq!(r.overround, 1.0 / 2.10 + 1.0 / 2.05, epsilon = 1e-12);
        assert_relative_eq!(r.overround, 0.9642, epsilon = 1e-3);
        assert_relative_eq!(r.profit_percentage, 3.58, epsilon = 0.05);

        // stake_1 = total / (1 + o1/o2)
        assert_relative_eq!(r.legs[0].stake, 100.0 / (1.0 + 2.10 / 2.05), epsilon = 1e-9);
        assert_relative_eq!(r.legs[0].stake + r.legs[1].stake, 100.0, epsilon = 1e-9);
        assert_relative_eq!(r.legs[0].payout, r.legs[1].payout, epsilon = 1e-2);
        assert!(r.guaranteed_profit.unwrap() > 0.0);
    }

    #[test]
    fn no_arbitrage_is_not_an_error() {
        let r = two_way(1.90, 1.90, Some(100.0)).unwrap();
        assert!(!r.is_arbitrage);
        assert_eq!(r.profit_percentage, 0.0);
        assert!(r.legs.is_empty());
        assert!(r.guaranteed_return.is_none());
    }

    #[test]
    fn without_stake_reports_only_the_opportunity() {
        let r = two_way(2.10, 2.05, None).unwrap();
        assert!(r.is_arbitrage);
        assert!(r.legs.is_empty());
        assert!(r.guaranteed_profit.is_none());
    }

    #[test]
    fn three_way_across_bookmakers() {
        let quote = MarketQuote::new(
            MarketType::MatchWinner,
            vec![
                OutcomePrice::from_bookmaker("home", 2.90, "A"),
                OutcomePrice::from_bookmaker("draw", 3.40, "A"),
                OutcomePrice::from_bookmaker("away", 3.10, "A"),
                OutcomePrice::from_bookmaker("home", 3.20, "B"),
                OutcomePrice::from_bookmaker("draw", 3.80, "C"),
                OutcomePrice::from_bookmaker("away", 3.60, "C"),
            ],
        );
        let r = detect_quote(&quote, Some(300.0)).unwrap();
        assert!(r.is_arbitrage);
        assert_eq!(r.legs[0].bookmaker.as_deref(), Some("B"));
        let first = r.legs[0].payout;
        for leg in &r.legs {
            assert_relative_eq!(leg.payout, first, epsilon = 1e-9);
        }
        let staked: f64 = r.legs.iter().map(|l| l.stake).sum();
        assert_relative_eq!(staked, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn dutching_equalises_returns() {
        let sels = vec![
            OutcomePrice::new("A", 4.0),
            OutcomePrice::new("B", 5.0),
            OutcomePrice::new("C", 10.0),
        ];
        let r = dutch(&sels, 100.0).unwrap();
        // Σ 1/o = 0.55 → return 181.82
        assert_relative_eq!(r.expected_return, 100.0 / 0.55, epsilon = 1e-9);
        for leg in &r.legs {
            assert_relative_eq!(leg.payout, r.expected_return, epsilon = 1e-9);
        }
        assert!(r.is_profitable);
    }

    #[test]
    fn dutching_requires_two_selections() {
        assert!(dutch(&[OutcomePrice::new("A", 2.0)], 10.0).is_err());
        assert!(dutch(&[OutcomePrice::new("A", 2.0), OutcomePrice::new("B", 1.0)], 10.0).is_err());
        let r = dutch(&[OutcomePrice::new("A", 1.5), OutcomePrice::new("B", 2.2)], 10.0).unwrap();
        assert!(!r.is_profitable);
    }
}
