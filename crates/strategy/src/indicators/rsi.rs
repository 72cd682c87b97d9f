/// RSI (Relative Strength Index) indicator.
///
/// Simple average of gains and losses over the last `period` price changes.
/// Degenerate inputs resolve to fixed values instead of failing: fewer than
/// `period + 1` prices gives the neutral 50, no losses at all gives 100.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub const NEUTRAL: f64 = 50.0;

    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    pub fn compute(&self, closes: &[f64]) -> f64 {
        if closes.len() < self.period + 1 {
            return Self::NEUTRAL;
        }

        let window = &closes[closes.len() - (self.period + 1)..];
        let (gains, losses) = window
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0, 0.0), |(g, l), change| {
                if change > 0.0 {
                    (g + change, l)
                } else {
                    (g, l - change)
                }
            });

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;

        if avg_loss == 0.0 {
            return 100.0;
        }

        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}
