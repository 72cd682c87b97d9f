pub mod aggregator;
pub mod config;
pub mod indicators;
pub mod pipeline;
pub mod registry;
pub mod strategies;

pub use aggregator::{Aggregator, Decision, NoSignalReason, ScoreBoard, WeightedVote};
pub use config::{IndicatorParams, StrategyConfig, StrategyFileConfig};
pub use indicators::IndicatorSet;
pub use pipeline::{rank_signals, Analysis, Analyzer};
pub use registry::StrategySet;
pub use strategies::{Stance, StrategyKind, StrategyVote};

/// All strategy implementations must satisfy this trait.
///
/// A strategy is a pure function of one `IndicatorSet`: it holds only its
/// thresholds and never sees another strategy's vote.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Vote on the symbol described by `indicators`.
    fn evaluate(&self, indicators: &IndicatorSet) -> StrategyVote;
}
