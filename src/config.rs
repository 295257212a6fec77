use std::path::PathBuf;

use clap::Parser;

use odds_engine::engine::analysis::AnalyzerConfig;
use odds_engine::engine::devig::DeVigMethod;
use odds_engine::engine::kelly::StakingConfig;
use odds_engine::engine::markets::OverUnderMethod;
use odds_engine::engine::poisson::PoissonConfig;

/// Analyze one fixture: reads a match-input JSON document and prints the
/// analysis as JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "odds-engine", version, about)]
pub struct Config {
    /// Match-input JSON file (stdin when omitted)
    #[arg(long, env = "INPUT")]
    pub input: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, env = "PRETTY", default_value = "false")]
    pub pretty: bool,

    /// Bankroll used for Kelly stake sizing
    #[arg(long, env = "BANKROLL", default_value = "1000.0")]
    pub bankroll: f64,

    /// Stake used to express EV in currency units
    #[arg(long, env = "REFERENCE_STAKE", default_value = "10.0")]
    pub reference_stake: f64,

    /// Fractional Kelly multiplier (0.0–1.0)
    #[arg(long, env = "KELLY_FRACTION", default_value = "0.25")]
    pub kelly_fraction: f64,

    /// Maximum stake as a fraction of bankroll (e.g. 0.05 = 5%)
    #[arg(long, env = "MAX_STAKE_PCT", default_value = "0.05")]
    pub max_stake_pct: f64,

    /// Smallest stake worth placing
    #[arg(long, env = "MIN_STAKE", default_value = "1.0")]
    pub min_stake: f64,

    /// Score-grid truncation for the goal model
    #[arg(long, env = "MAX_GOALS", default_value = "6")]
    pub max_goals: u32,

    /// Override the home side's home-advantage multiplier
    #[arg(long, env = "HOME_ADVANTAGE")]
    pub home_advantage: Option<f64>,

    /// How the over/under analyzer estimates P(over)
    #[arg(long, env = "OVER_UNDER_METHOD", value_enum, default_value = "margin-heuristic")]
    pub over_under_method: OverUnderMethod,

    /// Margin removal method for market quotes
    #[arg(long, env = "DEVIG_METHOD", value_enum, default_value = "proportional")]
    pub devig_method: DeVigMethod,

    /// JSON array of settled fixtures, each a model `forecast` distribution
    /// and the `result` label; when given, a Platt calibration is fitted and
    /// applied to model probabilities
    #[arg(long, env = "CALIBRATION_SAMPLES")]
    pub calibration_samples: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bankroll <= 0.0 || !self.bankroll.is_finite() {
            anyhow::bail!("bankroll must be positive");
        }
        if self.reference_stake <= 0.0 || !self.reference_stake.is_finite() {
            anyhow::bail!("reference_stake must be positive");
        }
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            anyhow::bail!("kelly_fraction must be in (0.0, 1.0]");
        }
        if !(self.max_stake_pct > 0.0 && self.max_stake_pct <= 1.0) {
            anyhow::bail!("max_stake_pct must be in (0.0, 1.0]");
        }
        if self.min_stake < 0.0 {
            anyhow::bail!("min_stake cannot be negative");
        }
        if !(1..=30).contains(&self.max_goals) {
            anyhow::bail!("max_goals must be between 1 and 30");
        }
        if let Some(h) = self.home_advantage {
            if !(0.5..=2.0).contains(&h) {
                anyhow::bail!("home_advantage must be between 0.5 and 2.0");
            }
        }
        Ok(())
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            bankroll: self.bankroll,
            reference_stake: self.reference_stake,
            staking: StakingConfig {
                kelly_fraction: self.kelly_fraction,
                max_stake_pct: self.max_stake_pct,
                min_stake: self.min_stake,
            },
            poisson: PoissonConfig {
                max_goals: self.max_goals,
            },
            over_under_method: self.over_under_method,
            devig_method: self.devig_method,
            ..AnalyzerConfig::default()
        }
    }
}
