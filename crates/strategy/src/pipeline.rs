use chrono::{DateTime, Utc};
use tracing::debug;

use common::{MarketSnapshot, Result, Signal};

use crate::aggregator::{Aggregator, Decision, ScoreBoard, WeightedVote};
use crate::config::{IndicatorParams, StrategyFileConfig};
use crate::indicators::IndicatorSet;
use crate::registry::StrategySet;

/// Full per-symbol outcome of one analysis pass.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub indicators: IndicatorSet,
    pub votes: Vec<WeightedVote>,
    pub scores: ScoreBoard,
    pub decision: Decision,
    pub signal: Option<Signal>,
}

/// Indicators → strategy votes → aggregated decision, for one snapshot at a time.
///
/// Holds only immutable configuration, so one instance can analyze any
/// number of symbols concurrently.
pub struct Analyzer {
    params: IndicatorParams,
    strategies: StrategySet,
    aggregator: Aggregator,
}

impl Analyzer {
    pub fn new(params: IndicatorParams, strategies: StrategySet, aggregator: Aggregator) -> Self {
        Self {
            params,
            strategies,
            aggregator,
        }
    }

    pub fn from_config(cfg: &StrategyFileConfig) -> Result<Self> {
        Ok(Self::new(
            cfg.indicators.clone(),
            StrategySet::from_config(cfg)?,
            Aggregator::new(cfg.dominance_ratio, cfg.min_confidence),
        ))
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    /// Analyze one snapshot. `vix` is the reference level fetched in the same cycle.
    pub fn analyze(&self, snapshot: &MarketSnapshot, vix: Option<f64>, now: DateTime<Utc>) -> Analysis {
        let indicators = IndicatorSet::compute(snapshot, vix, &self.params);
        let votes = self.strategies.evaluate(&indicators);
        let scores = ScoreBoard::tally(&votes);
        let decision = self.aggregator.decide(&scores);

        debug!(
            symbol = %snapshot.symbol,
            buy = scores.buy_score,
            sell = scores.sell_score,
            iv_rank = indicators.iv_rank,
            ?decision,
            "Scored symbol"
        );

        let signal = decision.to_signal(&snapshot.symbol, snapshot.price, now).ok();

        Analysis {
            indicators,
            votes,
            scores,
            decision,
            signal,
        }
    }
}

/// Order a cycle's signals by confidence, highest first, ties by symbol.
pub fn rank_signals(signals: &mut [Signal]) {
    signals.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
