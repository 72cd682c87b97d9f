//! Price-band indicators computed over a trailing window.

/// Bollinger Bands.
///
/// Middle band = mean of the trailing `window` closes, upper/lower = middle ±
/// `k` population standard deviations. A history shorter than `window` uses every
/// close available.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn bollinger(closes: &[f64], window: usize, k: f64) -> Bollinger {
    let slice = trailing(closes, window);
    if slice.is_empty() {
        return Bollinger::default();
    }
    let middle = mean(slice);
    let std = population_std(slice);
    Bollinger {
        upper: middle + k * std,
        middle,
        lower: middle - k * std,
    }
}

/// Volume-weighted average price over the trailing `window` bars.
/// Falls back to the latest close when the window carries no volume.
pub fn vwap(closes: &[f64], volumes: &[f64], window: usize) -> f64 {
    let n = closes.len().min(volumes.len());
    let closes = trailing(&closes[..n], window);
    let volumes = trailing(&volumes[..n], window);

    let total_volume: f64 = volumes.iter().sum();
    if total_volume <= 0.0 {
        return closes.last().copied().unwrap_or(0.0);
    }
    closes
        .iter()
        .zip(volumes)
        .map(|(c, v)| c * v)
        .sum::<f64>()
        / total_volume
}

pub(crate) fn trailing(values: &[f64], window: usize) -> &[f64] {
    &values[values.len().saturating_sub(window)..]
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Standard deviation with Bessel's correction; 0 for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_on_flat_prices_collapses() {
        let bands = bollinger(&[10.0; 30], 20, 2.0);
        assert_eq!(bands.upper, 10.0);
        assert_eq!(bands.middle, 10.0);
        assert_eq!(bands.lower, 10.0);
    }

    #[test]
    fn bollinger_bands_are_symmetric() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + (i % 3) as f64).collect();
        let bands = bollinger(&closes, 20, 2.0);
        assert!(bands.upper > bands.middle && bands.middle > bands.lower);
        assert!(((bands.upper - bands.middle) - (bands.middle - bands.lower)).abs() < 1e-9);
    }

    #[test]
    fn bollinger_short_history_uses_available_closes() {
        let bands = bollinger(&[1.0, 3.0], 20, 2.0);
        assert_eq!(bands.middle, 2.0);
        // population std of [1, 3] is 1
        assert_eq!(bands.upper, 4.0);
        assert_eq!(bands.lower, 0.0);
    }

    #[test]
    fn vwap_weights_by_volume() {
        let v = vwap(&[10.0, 20.0], &[1.0, 3.0], 20);
        assert!((v - 17.5).abs() < 1e-12);
    }

    #[test]
    fn vwap_without_volume_falls_back_to_latest_close() {
        assert_eq!(vwap(&[10.0, 12.0], &[0.0, 0.0], 20), 12.0);
        assert_eq!(vwap(&[], &[], 20), 0.0);
    }
}
