use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ── Odds ─────────────────────────────────────────────────────────────────────

/// Representation an odds value is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsFormat {
    /// Payout per unit staked, stake included (2.50)
    Decimal,
    /// Profit per unit staked (1.50, i.e. 3/2)
    Fractional,
    /// Moneyline (+150 / -200)
    American,
    /// 1 / decimal (0.40)
    ImpliedProbability,
}

/// Decimal odds, validated to be finite and strictly greater than 1.0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Odds(f64);

impl Odds {
    pub fn new(decimal: f64) -> Result<Self> {
        if !decimal.is_finite() {
            return Err(EngineError::InvalidOdds {
                value: decimal,
                reason: "odds must be finite",
            });
        }
        if decimal <= 1.0 {
            return Err(EngineError::InvalidOdds {
                value: decimal,
                reason: "decimal odds must be greater than 1.0",
            });
        }
        Ok(Odds(decimal))
    }

    pub fn decimal(self) -> f64 {
        self.0
    }

    /// Net odds `b`: profit per unit staked.
    pub fn net(self) -> f64 {
        self.0 - 1.0
    }

    pub fn implied_probability(self) -> f64 {
        1.0 / self.0
    }
}

impl TryFrom<f64> for Odds {
    type Error = EngineError;

    fn try_from(value: f64) -> Result<Self> {
        Odds::new(value)
    }
}

impl From<Odds> for f64 {
    fn from(o: Odds) -> f64 {
        o.0
    }
}

// ── Markets ──────────────────────────────────────────────────────────────────

/// The betting market a quote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketType {
    /// 1X2 (home/draw/away) or moneyline (home/away)
    MatchWinner,
    OverUnder { line: f64 },
    BothTeamsToScore,
    DrawNoBet,
}

/// A single priced outcome inside a market quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomePrice {
    /// Outcome label, e.g. "home", "draw", "over", "yes"
    pub label: String,
    /// Decimal odds as quoted (validated when the quote is consumed)
    pub odds: f64,
    pub bookmaker: Option<String>,
}

impl OutcomePrice {
    pub fn new(label: impl Into<String>, odds: f64) -> Self {
        OutcomePrice {
            label: label.into(),
            odds,
            bookmaker: None,
        }
    }

    pub fn from_bookmaker(
        label: impl Into<String>,
        odds: f64,
        bookmaker: impl Into<String>,
    ) -> Self {
        OutcomePrice {
            label: label.into(),
            odds,
            bookmaker: Some(bookmaker.into()),
        }
    }
}

/// Raw odds for one market, as delivered by the odds-ingestion side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub market: MarketType,
    pub prices: Vec<OutcomePrice>,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl MarketQuote {
    pub fn new(market: MarketType, prices: Vec<OutcomePrice>) -> Self {
        MarketQuote {
            market,
            prices,
            timestamp: Utc::now(),
        }
    }

    /// First price quoted for `label` (case-insensitive).
    pub fn price(&self, label: &str) -> Option<&OutcomePrice> {
        self.prices
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label))
    }
}

// ── Team statistics ──────────────────────────────────────────────────────────

fn default_home_advantage() -> f64 {
    1.10
}

fn default_recency_window() -> u32 {
    10
}

/// Recent scoring form of one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamForm {
    pub name: String,
    /// Average goals scored per match
    pub attack: f64,
    /// Average goals conceded per match
    pub defense: f64,
    /// Matches the averages were computed over
    pub matches_played: u32,
    /// Multiplier applied to expected goals when this team plays at home
    #[serde(default = "default_home_advantage")]
    pub home_advantage: f64,
    /// Number of most recent matches the averages should cover
    #[serde(default = "default_recency_window")]
    pub recency_window: u32,
}

impl TeamForm {
    pub fn new(name: impl Into<String>, attack: f64, defense: f64, matches_played: u32) -> Self {
        TeamForm {
            name: name.into(),
            attack,
            defense,
            matches_played,
            home_advantage: default_home_advantage(),
            recency_window: default_recency_window(),
        }
    }

    pub fn with_home_advantage(mut self, multiplier: f64) -> Self {
        self.home_advantage = multiplier;
        self
    }

    /// Matches actually behind the averages: the recency window, or fewer
    /// when the team has not played that many.
    pub fn sample_size(&self) -> u32 {
        self.matches_played.min(self.recency_window)
    }

    /// Whether the averages cover fewer matches than the recency window asks for.
    pub fn is_thin(&self) -> bool {
        self.matches_played < self.recency_window
    }

    pub fn validate(&self) -> Result<()> {
        if self.recency_window == 0 {
            return Err(EngineError::InvalidConfig {
                field: "recency_window",
                reason: format!("recency window for {} must cover at least one match", self.name),
            });
        }
        if self.sample_size() == 0 {
            return Err(EngineError::InsufficientFormData {
                team: self.name.clone(),
            });
        }
        for (field, value) in [("attack", self.attack), ("defense", self.defense)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidConfig {
                    field,
                    reason: format!("{} for {} must be a non-negative rate", value, self.name),
                });
            }
        }
        if !self.home_advantage.is_finite() || self.home_advantage <= 0.0 {
            return Err(EngineError::InvalidConfig {
                field: "home_advantage",
                reason: format!("{} must be positive", self.home_advantage),
            });
        }
        Ok(())
    }
}

/// Per-team scoring frequencies used by the BTTS market (fractions 0.0–1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    /// Share of matches in which the team scored
    pub scored_in: f64,
    /// Share of matches in which the team conceded
    pub conceded_in: Option<f64>,
    /// Share of the team's matches that ended with both sides scoring
    pub btts_rate: f64,
}

impl ScoringProfile {
    pub fn validate(&self) -> Result<()> {
        let shares = [
            ("scored_in", Some(self.scored_in)),
            ("conceded_in", self.conceded_in),
            ("btts_rate", Some(self.btts_rate)),
        ];
        for (field, share) in shares {
            if let Some(v) = share {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EngineError::InvalidConfig {
                        field,
                        reason: format!("{} is not a share in [0, 1]", v),
                    });
                }
            }
        }
        Ok(())
    }
}

// ── Probability distributions ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbability {
    pub label: String,
    pub probability: f64,
}

/// Probabilities over an exhaustive, mutually exclusive outcome set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Distribution {
    pub outcomes: Vec<OutcomeProbability>,
}

impl Distribution {
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Self {
        Distribution {
            outcomes: pairs
                .into_iter()
                .map(|(label, probability)| OutcomeProbability {
                    label: label.into(),
                    probability,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.outcomes
            .iter()
            .find(|o| o.label.eq_ignore_ascii_case(label))
            .map(|o| o.probability)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.label.as_str()).collect()
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.outcomes.iter().map(|o| o.probability).collect()
    }

    pub fn sum(&self) -> f64 {
        self.outcomes.iter().map(|o| o.probability).sum()
    }

    /// Rescale so the probabilities sum to 1.
    pub fn normalized(&self) -> Result<Self> {
        let total = self.sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(EngineError::NoData(format!(
                "cannot normalize distribution with total mass {}",
                total
            )));
        }
        Ok(Distribution {
            outcomes: self
                .outcomes
                .iter()
                .map(|o| OutcomeProbability {
                    label: o.label.clone(),
                    probability: o.probability / total,
                })
                .collect(),
        })
    }

    /// Label of the most probable outcome.
    pub fn favourite(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
            .map(|o| o.label.as_str())
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

/// Qualitative value rating shared by the EV calculator and market analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    NoValue,
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Return/profit breakdown for a single bet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetCalculation {
    pub stake: f64,
    /// Decimal odds after conversion
    pub odds: f64,
    pub original_odds: f64,
    pub odds_format: OddsFormat,
    /// Stake plus profit, net of commission
    pub potential_return: f64,
    /// Profit net of commission
    pub potential_profit: f64,
    pub commission: f64,
    pub implied_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EVResult {
    /// Expected profit in currency units
    pub expected_value: f64,
    pub ev_percentage: f64,
    pub is_positive_ev: bool,
    pub true_probability: f64,
    pub implied_probability: f64,
    /// Relative edge over the bookmaker, in percent
    pub edge_percentage: f64,
    /// Absolute probability gap (true − implied)
    pub value_gap: f64,
    /// 1 / true_probability
    pub fair_odds: f64,
    pub tier: RecommendationTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KellyAdvice {
    NoEdge,
    SmallEdge,
    GoodEdge,
    HighEdge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KellyResult {
    pub bankroll: f64,
    /// Full Kelly fraction of bankroll; negative means no edge
    pub full_kelly: f64,
    pub fractional_kelly: f64,
    pub full_kelly_stake: f64,
    /// Fractional Kelly stake after the min/max clamp (0 when there is no edge)
    pub recommended_stake: f64,
    pub max_stake: f64,
    pub conservative_stake: f64,
    pub advice: KellyAdvice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeVerdict {
    ReduceStake,
    IncreaseStake,
    Optimal,
}

/// Rating of a proposed stake against the bankroll and Kelly optimum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeAssessment {
    pub stake: f64,
    pub bankroll: f64,
    pub stake_percentage: f64,
    pub kelly_percentage: f64,
    pub kelly_optimal_stake: f64,
    pub risk_level: RiskLevel,
    pub verdict: StakeVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegStake {
    pub label: String,
    pub odds: f64,
    pub bookmaker: Option<String>,
    pub stake: f64,
    /// Payout if this leg wins
    pub payout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageResult {
    /// Σ 1/odds across legs
    pub overround: f64,
    pub is_arbitrage: bool,
    pub profit_percentage: f64,
    pub total_stake: Option<f64>,
    /// Empty when there is no opportunity or no stake was given
    pub legs: Vec<LegStake>,
    pub guaranteed_return: Option<f64>,
    pub guaranteed_profit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DutchingResult {
    pub total_stake: f64,
    pub expected_return: f64,
    pub expected_profit: f64,
    pub legs: Vec<LegStake>,
    pub is_profitable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorLeg {
    pub selection: String,
    pub odds: f64,
    /// Estimated win probability; the implied probability is used when absent
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumulatorResult {
    pub total_odds: f64,
    pub stake: f64,
    pub potential_return: f64,
    pub potential_profit: f64,
    pub win_probability: f64,
    pub expected_value: f64,
    pub is_recommended: bool,
}

/// One single bet offered for comparison against an accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleBet {
    pub selection: String,
    pub stake: f64,
    pub odds: f64,
    /// Estimated win probability; the implied probability is used when absent
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleBetChoice {
    Singles,
    Accumulator,
}

/// The same selections staked as singles or combined into one accumulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultipleBetScenarios {
    pub total_stake: f64,
    pub singles: Vec<EVResult>,
    pub singles_total_ev: f64,
    /// Accumulator staked with the singles' combined stake
    pub accumulator: AccumulatorResult,
    pub recommendation: MultipleBetChoice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EachWayResult {
    /// Both parts together (2 × unit stake)
    pub total_stake: f64,
    pub win_odds: f64,
    pub place_odds: f64,
    pub place_fraction: f64,
    pub places: u32,
    pub win_and_place_return: f64,
    pub win_and_place_profit: f64,
    pub place_only_return: f64,
    pub place_only_profit: f64,
    pub loss: f64,
}

/// Outcome of one market-specific analyzer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRecommendation {
    pub market: MarketType,
    /// Recommended selection, `None` when nothing qualifies
    pub selection: Option<String>,
    /// Model probability of the recommended (or primary) selection
    pub probability: f64,
    /// EV per unit staked of the recommended (or best) selection
    pub expected_value: f64,
    pub tier: RecommendationTier,
    pub confidence: f64,
    pub suggested_stake_pct: f64,
    pub risk_level: RiskLevel,
    pub reasoning: Vec<String>,
}
