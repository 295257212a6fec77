//! Deterministic odds, probability and stake-sizing engine for football
//! betting markets.
//!
//! Bookmaker odds are de-vigged into market probabilities, team form is run
//! through an independent-Poisson goal model (optionally Platt-calibrated
//! and with rule-based draw pinning), and the two are blended with bounded
//! shrinkage toward the market. The result feeds expected-value,
//! Kelly staking, side-market analyzers and arbitrage/dutching allocation.
//! Every operation is a pure function over value types.

pub mod engine;
pub mod error;
pub mod models;

pub use error::{EngineError, Result};
