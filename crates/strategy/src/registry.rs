use std::collections::HashMap;

use tracing::{debug, info};

use common::{Error, Result};

use crate::aggregator::WeightedVote;
use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::indicators::IndicatorSet;
use crate::strategies::{
    ContrarianStrategy, IvHvSpreadStrategy, IvRankStrategy, MomentumStrategy, StrategyKind,
    TrendStrategy, VixReversionStrategy,
};
use crate::Strategy;

/// One configured strategy instance.
struct Entry {
    name: String,
    weight: f64,
    strategy: Box<dyn Strategy>,
}

/// The enabled strategies and their weights, in config order.
pub struct StrategySet {
    entries: Vec<Entry>,
}

impl StrategySet {
    /// Build the set from config. Disabled entries are skipped.
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self> {
        let mut entries = Vec::new();

        for cfg in &file_cfg.strategies {
            if !cfg.enabled {
                debug!(strategy_type = %cfg.strategy_type, "Strategy disabled, skipping");
                continue;
            }
            let strategy = build_strategy(cfg).map_err(Error::Config)?;
            let kind = strategy.kind();
            let name = cfg.name.clone().unwrap_or_else(|| kind.name().to_string());
            let weight = cfg.weight.unwrap_or_else(|| kind.default_weight());
            info!(name = %name, weight, "Registered strategy");
            entries.push(Entry { name, weight, strategy });
        }

        Ok(Self { entries })
    }

    /// All six strategies with default thresholds and weights.
    pub fn standard() -> Self {
        let entries = StrategyKind::ALL
            .iter()
            .map(|&kind| Entry {
                name: kind.name().to_string(),
                weight: kind.default_weight(),
                strategy: default_strategy(kind),
            })
            .collect();
        Self { entries }
    }

    /// Evaluate every strategy against one indicator set.
    pub fn evaluate(&self, indicators: &IndicatorSet) -> Vec<WeightedVote> {
        self.entries
            .iter()
            .map(|e| WeightedVote {
                strategy: e.name.clone(),
                weight: e.weight,
                vote: e.strategy.evaluate(indicators),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn default_strategy(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::IvRank => Box::new(IvRankStrategy::default()),
        StrategyKind::VixReversion => Box::new(VixReversionStrategy::default()),
        StrategyKind::IvHvSpread => Box::new(IvHvSpreadStrategy::default()),
        StrategyKind::Momentum => Box::new(MomentumStrategy::default()),
        StrategyKind::Contrarian => Box::new(ContrarianStrategy::default()),
        StrategyKind::Trend => Box::new(TrendStrategy::default()),
    }
}

fn build_strategy(cfg: &StrategyConfig) -> std::result::Result<Box<dyn Strategy>, String> {
    let kind: StrategyKind = cfg.strategy_type.parse()?;
    let p = &cfg.params;
    let strategy: Box<dyn Strategy> = match kind {
        StrategyKind::IvRank => {
            let d = IvRankStrategy::default();
            Box::new(IvRankStrategy {
                upper: param_f64(p, "upper", d.upper),
                lower: param_f64(p, "lower", d.lower),
            })
        }
        StrategyKind::VixReversion => {
            let d = VixReversionStrategy::default();
            Box::new(VixReversionStrategy {
                panic_level: param_f64(p, "panic_level", d.panic_level),
                complacent_level: param_f64(p, "complacent_level", d.complacent_level),
                elevated_level: param_f64(p, "elevated_level", d.elevated_level),
                calm_level: param_f64(p, "calm_level", d.calm_level),
                move_pct: param_f64(p, "move_pct", d.move_pct),
                strong_confidence: param_f64(p, "strong_confidence", d.strong_confidence),
                mild_confidence: param_f64(p, "mild_confidence", d.mild_confidence),
            })
        }
        StrategyKind::IvHvSpread => {
            let d = IvHvSpreadStrategy::default();
            Box::new(IvHvSpreadStrategy {
                rich: param_f64(p, "rich", d.rich),
                cheap: param_f64(p, "cheap", d.cheap),
            })
        }
        StrategyKind::Momentum => {
            let d = MomentumStrategy::default();
            Box::new(MomentumStrategy {
                short_pct: param_f64(p, "short_pct", d.short_pct),
                long_pct: param_f64(p, "long_pct", d.long_pct),
                rank_pivot: param_f64(p, "rank_pivot", d.rank_pivot),
                confidence: param_f64(p, "confidence", d.confidence),
            })
        }
        StrategyKind::Contrarian => {
            let d = ContrarianStrategy::default();
            Box::new(ContrarianStrategy {
                move_pct: param_f64(p, "move_pct", d.move_pct),
                high_rank: param_f64(p, "high_rank", d.high_rank),
                low_rank: param_f64(p, "low_rank", d.low_rank),
                confidence: param_f64(p, "confidence", d.confidence),
            })
        }
        StrategyKind::Trend => {
            let d = TrendStrategy::default();
            Box::new(TrendStrategy {
                confidence: param_f64(p, "confidence", d.confidence),
            })
        }
    };
    Ok(strategy)
}

/// Numeric parameter lookup. Integers are accepted where floats are expected.
fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .unwrap_or(default)
}
