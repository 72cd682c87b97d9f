use super::average::ema;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow) over the whole close series.
/// The signal line is the EMA(signal) of a series made of `signal` copies of
/// the current MACD value, so it tracks the line itself and the histogram
/// stays at zero. The output is used as a trend-state reading, not for
/// crossover timing.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// The result of a MACD computation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast,
            slow,
            signal: signal.max(1),
        }
    }

    /// Compute MACD from a slice of close prices (oldest first).
    /// Empty input yields an all-zero result.
    pub fn compute(&self, closes: &[f64]) -> Macd {
        let line = ema(closes, self.fast) - ema(closes, self.slow);
        let signal = ema(&vec![line; self.signal], self.signal);
        Macd {
            line,
            signal,
            histogram: line - signal,
        }
    }
}

impl Default for MacdIndicator {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    fn trending_down(n: usize) -> Vec<f64> {
        (0..n).map(|i| 200.0 - i as f64 * 0.5).collect()
    }

    #[test]
    fn macd_of_empty_history_is_zero() {
        assert_eq!(MacdIndicator::default().compute(&[]), Macd::default());
    }

    #[test]
    fn macd_line_positive_in_uptrend() {
        let macd = MacdIndicator::default().compute(&trending_up(40));
        assert!(macd.line > 0.0);
    }

    #[test]
    fn macd_line_negative_in_downtrend() {
        let macd = MacdIndicator::default().compute(&trending_down(40));
        assert!(macd.line < 0.0);
    }

    #[test]
    fn signal_line_tracks_macd_value() {
        let macd = MacdIndicator::default().compute(&trending_up(60));
        assert!((macd.signal - macd.line).abs() < 1e-9);
        assert!(macd.histogram.abs() < 1e-9);
    }
}
