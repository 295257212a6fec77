pub mod analysis;
pub mod arbitrage;
pub mod bet;
pub mod blend;
pub mod calibration;
pub mod devig;
pub mod draw_rule;
pub mod ev;
pub mod kelly;
pub(crate) mod logistic;
pub mod markets;
pub mod odds;
pub mod poisson;

pub use analysis::{AnalyzerConfig, MatchAnalysis, MatchAnalyzer, MatchInput};
pub use blend::{blend, BlendConfig, BlendResult};
pub use devig::{devig, devig_quote, DeVigMethod};
pub use draw_rule::{DrawRuleConfig, DrawSignals};
pub use ev::{calculate_ev, EvThresholds};
pub use kelly::{assess_stake, kelly, StakingConfig};
pub use markets::{rank_markets, MarketThresholds, OverUnderMethod};
pub use odds::convert;
pub use poisson::{predict, PoissonConfig};
