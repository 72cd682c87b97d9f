pub mod average;
pub mod bands;
pub mod macd;
pub mod rsi;
pub mod volatility;

pub use average::{ema, sma};
pub use bands::{bollinger, vwap, Bollinger};
pub use macd::{Macd, MacdIndicator};
pub use rsi::RsiIndicator;
pub use volatility::{historical_volatility, volatility_reading, VolatilityReading};

use serde::Serialize;

use common::MarketSnapshot;

use crate::config::IndicatorParams;

/// Everything the strategies read about one symbol in one cycle.
///
/// Computed from a `MarketSnapshot` by [`IndicatorSet::compute`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub symbol: String,
    pub price: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub vwap: f64,
    pub hv: f64,
    pub iv: f64,
    pub iv_rank: f64,
    pub iv_hv_spread: f64,
    pub vix: f64,
    /// Percent change over the short horizon (5 bars by default).
    pub change_short_pct: f64,
    /// Percent change over the long horizon (20 bars by default).
    pub change_long_pct: f64,
    pub volume_ratio: f64,
}

impl IndicatorSet {
    /// Derive the indicator state for one snapshot.
    ///
    /// `vix` is the reference volatility level fetched in the same cycle;
    /// `None` falls back to the configured neutral level.
    pub fn compute(snapshot: &MarketSnapshot, vix: Option<f64>, params: &IndicatorParams) -> Self {
        let closes = snapshot.history.closes();
        let volumes = snapshot.history.volumes();

        let macd = MacdIndicator::new(params.ema_fast, params.ema_slow, params.macd_signal)
            .compute(&closes);
        let bands = bollinger(&closes, params.bollinger_window, params.bollinger_k);
        let vol = volatility_reading(&closes, snapshot.implied_volatility, params);

        Self {
            symbol: snapshot.symbol.clone(),
            price: snapshot.price,
            sma_fast: sma(&closes, params.sma_fast),
            sma_slow: sma(&closes, params.sma_slow),
            ema_fast: ema(&closes, params.ema_fast),
            ema_slow: ema(&closes, params.ema_slow),
            rsi: RsiIndicator::new(params.rsi_period).compute(&closes),
            macd: macd.line,
            macd_signal: macd.signal,
            macd_histogram: macd.histogram,
            bb_upper: bands.upper,
            bb_middle: bands.middle,
            bb_lower: bands.lower,
            vwap: vwap(&closes, &volumes, params.bollinger_window),
            hv: vol.hv,
            iv: vol.iv,
            iv_rank: vol.iv_rank,
            iv_hv_spread: vol.iv_hv_spread,
            vix: vix.filter(|v| v.is_finite()).unwrap_or(params.neutral_vix),
            change_short_pct: change_pct(&closes, params.short_change_bars),
            change_long_pct: change_pct(&closes, params.long_change_bars),
            volume_ratio: snapshot.volume_ratio,
        }
    }
}

/// Percentage change of the latest close against the close `bars` bars earlier.
/// 0 when the history is too short or the base close is 0.
pub fn change_pct(closes: &[f64], bars: usize) -> f64 {
    if bars == 0 || closes.len() <= bars {
        return 0.0;
    }
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - bars];
    if base == 0.0 {
        0.0
    } else {
        (last - base) / base * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::{Bar, PriceHistory};

    fn snapshot(closes: &[f64]) -> MarketSnapshot {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 21, 0, 0).unwrap();
        let history = PriceHistory::from_bars(closes.iter().enumerate().map(|(i, &c)| Bar {
            timestamp: start + Duration::days(i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1_000.0,
        }));
        let price = closes.last().copied().unwrap_or(0.0);
        MarketSnapshot::build("TEST", price, None, history, start)
    }

    #[test]
    fn change_pct_handles_short_history() {
        assert_eq!(change_pct(&[100.0, 110.0], 5), 0.0);
        assert!((change_pct(&[100.0, 0.0, 0.0, 0.0, 0.0, 110.0], 5) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn empty_history_yields_well_formed_set() {
        let set = IndicatorSet::compute(&snapshot(&[]), None, &IndicatorParams::default());
        assert_eq!(set.rsi, 50.0);
        assert_eq!(set.sma_fast, 0.0);
        assert_eq!(set.vix, 18.0);
        assert!(set.iv_rank.is_finite());
    }

    #[test]
    fn short_history_falls_back_to_latest_close() {
        let set = IndicatorSet::compute(&snapshot(&[10.0, 11.0, 12.0]), Some(21.0), &IndicatorParams::default());
        assert_eq!(set.sma_fast, 12.0);
        assert_eq!(set.sma_slow, 12.0);
        assert_eq!(set.rsi, 50.0);
        assert_eq!(set.vix, 21.0);
    }

    #[test]
    fn compute_is_deterministic() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let params = IndicatorParams::default();
        let a = IndicatorSet::compute(&snapshot(&closes), None, &params);
        let b = IndicatorSet::compute(&snapshot(&closes), None, &params);
        assert_eq!(a, b);
    }
}
