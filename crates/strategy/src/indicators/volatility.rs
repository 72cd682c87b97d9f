//! Realized / implied volatility and IV rank.

use super::bands::{sample_std, trailing};
use crate::config::IndicatorParams;

/// HV used when fewer than two returns are available.
pub const DEFAULT_HV: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityReading {
    /// Annualized historical volatility.
    pub hv: f64,
    /// Implied volatility, observed or approximated from HV.
    pub iv: f64,
    /// Position of `iv` inside its trailing range, 0–100.
    pub iv_rank: f64,
    /// `(iv - hv) / hv`, 0 when `hv` is 0.
    pub iv_hv_spread: f64,
}

/// Simple returns between consecutive closes. Pairs with a zero base are skipped.
pub fn returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized sample standard deviation of the trailing `window` returns.
/// `None` with fewer than two returns.
pub fn historical_volatility(closes: &[f64], window: usize, periods_per_year: f64) -> Option<f64> {
    let rets = returns(closes);
    let slice = trailing(&rets, window);
    if slice.len() < 2 {
        return None;
    }
    Some(sample_std(slice) * periods_per_year.sqrt())
}

/// Rolling annualized HV, one value per full `window` of returns.
fn rolling_hv(rets: &[f64], window: usize, periods_per_year: f64) -> Vec<f64> {
    if window < 2 || rets.len() < window {
        return Vec::new();
    }
    rets.windows(window)
        .map(|w| sample_std(w) * periods_per_year.sqrt())
        .collect()
}

/// IV rank over the trailing range of HV-derived IV.
///
/// Uses the rolling range when it holds at least `rank_min_samples` values
/// and is not flat, the fixed `[iv_floor, iv_ceiling]` band otherwise.
pub fn iv_rank(closes: &[f64], iv: f64, params: &IndicatorParams) -> f64 {
    let rets = returns(closes);
    let series = rolling_hv(&rets, params.hv_window, params.periods_per_year);
    let series = trailing(&series, params.rank_window);

    let (low, high) = if series.len() >= params.rank_min_samples {
        series
            .iter()
            .map(|hv| hv * params.iv_scale)
            .chain(std::iter::once(iv))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    } else {
        (params.iv_floor, params.iv_ceiling)
    };

    let (low, high) = if high > low {
        (low, high)
    } else {
        (params.iv_floor, params.iv_ceiling)
    };

    ((iv - low) / (high - low) * 100.0).clamp(0.0, 100.0)
}

/// Full volatility reading for one symbol.
pub fn volatility_reading(
    closes: &[f64],
    implied: Option<f64>,
    params: &IndicatorParams,
) -> VolatilityReading {
    let hv = historical_volatility(closes, params.hv_window, params.periods_per_year)
        .unwrap_or(DEFAULT_HV);
    let iv = implied
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(hv * params.iv_scale);
    let iv_hv_spread = if hv == 0.0 { 0.0 } else { (iv - hv) / hv };

    VolatilityReading {
        hv,
        iv,
        iv_rank: iv_rank(closes, iv, params),
        iv_hv_spread,
    }
}
