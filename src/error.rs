use thiserror::Error;

/// Recoverable failures raised by the engine. None of these is fatal: callers
/// decide whether to fall back to market-only or model-only estimates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid odds {value}: {reason}")]
    InvalidOdds { value: f64, reason: &'static str },

    #[error("invalid probability {value}: must lie in (0, 1]")]
    InvalidProbability { value: f64 },

    #[error("incomplete market: {reason}")]
    IncompleteMarket { reason: String },

    #[error("insufficient form data for {team}: no matches recorded")]
    InsufficientFormData { team: String },

    #[error("invalid stake {value}: must be positive and finite")]
    InvalidStake { value: f64 },

    #[error("invalid value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("no data: {0}")]
    NoData(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Reject probabilities outside (0, 1] or non-finite.
pub(crate) fn check_probability(p: f64) -> Result<f64> {
    if p.is_finite() && p > 0.0 && p <= 1.0 {
        Ok(p)
    } else {
        Err(EngineError::InvalidProbability { value: p })
    }
}

pub(crate) fn check_stake(stake: f64) -> Result<f64> {
    if stake.is_finite() && stake > 0.0 {
        Ok(stake)
    } else {
        Err(EngineError::InvalidStake { value: stake })
    }
}
