//! Moving averages over close prices (oldest first).

/// Simple moving average of the last `window` values.
///
/// With fewer than `window` values the most recent value is returned: the
/// "not enough data yet" fallback. Empty input yields 0.
pub fn sma(values: &[f64], window: usize) -> f64 {
    let Some(&last) = values.last() else {
        return 0.0;
    };
    if window == 0 || values.len() < window {
        return last;
    }
    values[values.len() - window..].iter().sum::<f64>() / window as f64
}

/// Exponential moving average seeded with the first value, multiplier `2/(window+1)`.
/// Empty input yields 0.
pub fn ema(values: &[f64], window: usize) -> f64 {
    let Some((&first, rest)) = values.split_first() else {
        return 0.0;
    };
    let k = 2.0 / (window as f64 + 1.0);
    rest.iter().fold(first, |acc, &price| (price - acc) * k + acc)
}
