//! Bookmaker margin removal.
//!
//! Raw implied probabilities `q_i = 1/odds_i` over a complete market sum to
//! more than 1 (the overround). Proportional de-vigging rescales them:
//!
//!   p_i = q_i / Σ q_j
//!
//! which keeps the bookmaker's relative ordering of outcomes intact.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{Distribution, MarketQuote, MarketType, OutcomePrice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeVigMethod {
    /// q_i / Σq
    #[default]
    Proportional,
    /// q_i − margin/n ("margin weights proportional to the odds"); longshots
    /// absorb relatively more of the margin.
    MarginWeighted,
}

/// Fair (no-vig) distribution for one market plus the margin that was removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeViggedMarket {
    pub distribution: Distribution,
    /// Σ 1/odds before normalization
    pub overround: f64,
    /// overround − 1
    pub margin: f64,
    pub method: DeVigMethod,
}

/// De-vig a complete set of outcome prices.
///
/// Any leg priced at or below 1.0 rejects the whole market: the caller must
/// fall back to model-only probabilities.
pub fn devig(prices: &[OutcomePrice], method: DeVigMethod) -> Result<DeViggedMarket> {
    if prices.len() < 2 {
        return Err(EngineError::IncompleteMarket {
            reason: format!("need at least two outcomes, got {}", prices.len()),
        });
    }
    if let Some(bad) = prices.iter().find(|p| !p.odds.is_finite() || p.odds <= 1.0) {
        return Err(EngineError::IncompleteMarket {
            reason: format!("outcome '{}' has unusable odds {}", bad.label, bad.odds),
        });
    }

    let raw: Vec<f64> = prices.iter().map(|p| 1.0 / p.odds).collect();
    let overround: f64 = raw.iter().sum();
    let margin = overround - 1.0;

    let proportional = || -> Vec<f64> { raw.iter().map(|q| q / overround).collect() };
    let (probs, method) = match method {
        DeVigMethod::Proportional => (proportional(), DeVigMethod::Proportional),
        DeVigMethod::MarginWeighted => {
            let n = raw.len() as f64;
            let weighted: Vec<f64> = raw.iter().map(|q| q - margin / n).collect();
            if weighted.iter().all(|p| *p > 0.0) {
                (weighted, DeVigMethod::MarginWeighted)
            } else {
                debug!(
                    "Margin-weighted de-vig went non-positive (margin={:.4}); using proportional",
                    margin
                );
                (proportional(), DeVigMethod::Proportional)
            }
        }
    };

    let distribution = Distribution::from_pairs(
        prices
            .iter()
            .zip(probs)
            .map(|(p, prob)| (p.label.clone(), prob)),
    );

    Ok(DeViggedMarket {
        distribution,
        overround,
        margin,
        method,
    })
}

/// Outcome labels a quote must carry to be complete, in canonical order.
pub fn required_legs(quote: &MarketQuote) -> &'static [&'static str] {
    match quote.market {
        MarketType::MatchWinner => {
            if quote.price("draw").is_some() {
                &["home", "draw", "away"]
            } else {
                &["home", "away"]
            }
        }
        MarketType::OverUnder { .. } => &["over", "under"],
        MarketType::BothTeamsToScore => &["yes", "no"],
        MarketType::DrawNoBet => &["home", "away"],
    }
}

/// Best available price per outcome across all bookmakers in the quote,
/// keeping the order in which labels first appear.
pub fn best_prices(quote: &MarketQuote) -> Vec<OutcomePrice> {
    let mut best: Vec<OutcomePrice> = Vec::new();
    for price in &quote.prices {
        match best
            .iter_mut()
            .find(|b| b.label.eq_ignore_ascii_case(&price.label))
        {
            Some(existing) => {
                let usable = |odds: f64| odds.is_finite() && odds > 1.0;
                if usable(price.odds) && (!usable(existing.odds) || price.odds > existing.odds) {
                    *existing = price.clone();
                }
            }
            None => best.push(price.clone()),
        }
    }
    best
}

/// Validate a quote against its market type and return the canonical legs
/// (best price per outcome).
pub fn complete_legs(quote: &MarketQuote) -> Result<Vec<OutcomePrice>> {
    let best = best_prices(quote);
    required_legs(quote)
        .iter()
        .map(|label| {
            best.iter()
                .find(|p| p.label.eq_ignore_ascii_case(label))
                .map(|p| OutcomePrice {
                    label: (*label).to_string(),
                    odds: p.odds,
                    bookmaker: p.bookmaker.clone(),
                })
                .ok_or_else(|| EngineError::IncompleteMarket {
                    reason: format!("{:?} quote is missing the '{}' leg", quote.market, label),
                })
        })
        .collect()
}

/// De-vig a market quote after checking that every required leg is present.
pub fn devig_quote(quote: &MarketQuote, method: DeVigMethod) -> Result<DeViggedMarket> {
    let legs = complete_legs(quote)?;
    devig(&legs, method)
}
