use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use common::{Error, Result};

use crate::strategies::StrategyKind;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// min_confidence = 0.55
/// dominance_ratio = 1.2
/// cooldown_secs = 15
/// max_positions = 5
///
/// [indicators]
/// iv_scale = 1.2
///
/// [[strategy]]
/// type = "iv_rank"
/// weight = 1.0
///
/// [strategy.params]
/// upper = 65.0
/// lower = 35.0
/// ```
///
/// Every field is optional. Without any `[[strategy]]` entry all six
/// strategies run at their default weights.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyFileConfig {
    /// Aggregated confidence below this floor produces no signal.
    pub min_confidence: f64,
    /// Multiple by which the winning side must exceed the other.
    pub dominance_ratio: f64,
    /// Minimum seconds between two orders on the same symbol (enforced by the dispatcher).
    pub cooldown_secs: u64,
    /// Open paper positions allowed at once across all symbols.
    pub max_positions: usize,
    pub indicators: IndicatorParams,
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

impl Default for StrategyFileConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.55,
            dominance_ratio: 1.2,
            cooldown_secs: 15,
            max_positions: 5,
            indicators: IndicatorParams::default(),
            strategies: StrategyKind::ALL.iter().map(|k| StrategyConfig::of(*k)).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier, e.g. "iv_rank" or "trend".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Name shown in logs. Defaults to the strategy's own name.
    #[serde(default)]
    pub name: Option<String>,
    /// Vote weight. Defaults to the strategy's standard weight.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Threshold overrides.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn enabled_default() -> bool {
    true
}

impl StrategyConfig {
    pub fn of(kind: StrategyKind) -> Self {
        Self {
            strategy_type: kind.id().to_string(),
            name: None,
            weight: None,
            enabled: true,
            params: HashMap::new(),
        }
    }
}

/// Lookback windows and volatility parameters of the indicator engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    /// Returns per HV estimate.
    pub hv_window: usize,
    /// Annualization factor for HV (252 for daily bars).
    pub periods_per_year: f64,
    /// IV ≈ HV × `iv_scale` when no options source is available.
    pub iv_scale: f64,
    /// Rolling HV values considered for IV rank.
    pub rank_window: usize,
    /// Below this many rolling values IV rank uses the fixed band.
    pub rank_min_samples: usize,
    pub iv_floor: f64,
    pub iv_ceiling: f64,
    /// VIX level assumed when the reference index was not fetched.
    pub neutral_vix: f64,
    pub short_change_bars: usize,
    pub long_change_bars: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_fast: 20,
            sma_slow: 50,
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            bollinger_window: 20,
            bollinger_k: 2.0,
            hv_window: 20,
            periods_per_year: 252.0,
            iv_scale: 1.2,
            rank_window: 252,
            rank_min_samples: 20,
            iv_floor: 0.10,
            iv_ceiling: 0.50,
            neutral_vix: 18.0,
            short_change_bars: 5,
            long_change_bars: 20,
        }
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file. A missing file yields the built-in defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Strategy config not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse strategy config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if !self.dominance_ratio.is_finite() || self.dominance_ratio < 1.0 {
            return Err(Error::Config(format!(
                "dominance_ratio must be at least 1.0, got {}",
                self.dominance_ratio
            )));
        }
        for s in &self.strategies {
            if s.strategy_type.parse::<StrategyKind>().is_err() {
                return Err(Error::Config(format!("unknown strategy type '{}'", s.strategy_type)));
            }
            if let Some(w) = s.weight {
                if !w.is_finite() || w < 0.0 {
                    return Err(Error::Config(format!(
                        "weight of '{}' must be a non-negative number, got {w}",
                        s.strategy_type
                    )));
                }
            }
        }
        if self.max_positions == 0 {
            return Err(Error::Config("max_positions must be at least 1".into()));
        }
        let p = &self.indicators;
        if p.iv_ceiling <= p.iv_floor {
            return Err(Error::Config("indicators.iv_ceiling must exceed iv_floor".into()));
        }
        if p.iv_scale <= 0.0 || p.periods_per_year <= 0.0 {
            return Err(Error::Config("indicators.iv_scale and periods_per_year must be positive".into()));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}
