use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

mod config;

use config::Config;
use odds_engine::engine::analysis::{MatchAnalyzer, MatchInput};
use odds_engine::engine::calibration::{fit_platt, CalibrationSample, FitConfig};

fn read_input(config: &Config) -> Result<String> {
    match &config.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read match input {}", path.display())),
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read match input from stdin")?;
            Ok(raw)
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    let mut input: MatchInput =
        serde_json::from_str(&read_input(&config)?).context("match input is not valid JSON")?;
    if let (Some(multiplier), Some(home)) = (config.home_advantage, input.home.as_mut()) {
        home.home_advantage = multiplier;
    }

    let mut analyzer_config = config.analyzer_config();
    if let Some(path) = &config.calibration_samples {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read calibration samples {}", path.display()))?;
        let samples: Vec<CalibrationSample> = serde_json::from_str(&raw)
            .context("calibration samples must be settled {forecast, result} fixtures")?;
        match fit_platt(&samples, &FitConfig::default()) {
            Ok(fit) if fit.logloss_improvement() > 0.0 => {
                analyzer_config.calibration = Some(fit.calibration);
            }
            Ok(_) => warn!("Calibration did not improve log-loss; using raw model probabilities"),
            Err(e) => warn!("Calibration rejected: {}", e),
        }
    }

    let analyzer = MatchAnalyzer::new(analyzer_config).context("invalid engine configuration")?;
    let analysis = analyzer.analyze(&input).context("fixture analysis failed")?;
    info!(
        "Analysis complete: source={:?}, best value={}",
        analysis.source,
        analysis.best_value.as_deref().unwrap_or("none")
    );

    let out = if config.pretty {
        serde_json::to_string_pretty(&analysis)?
    } else {
        serde_json::to_string(&analysis)?
    };
    println!("{}", out);
    Ok(())
}
