use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV sample from the market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered bars for one symbol, oldest first.
///
/// Timestamps are non-decreasing. The history may be shorter than any
/// indicator lookback; indicator functions fall back instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    bars: Vec<Bar>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from arbitrary bars, dropping any bar that would break
    /// timestamp ordering.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut history = Self::new();
        for bar in bars {
            history.push(bar);
        }
        history
    }

    /// Append a bar. A bar with the same timestamp as the last one replaces
    /// it (the provider re-sends the still-forming candle); an older bar is
    /// ignored. Returns `false` when the bar was ignored.
    pub fn push(&mut self, bar: Bar) -> bool {
        match self.bars.last_mut() {
            Some(last) if bar.timestamp < last.timestamp => false,
            Some(last) if bar.timestamp == last.timestamp => {
                *last = bar;
                true
            }
            _ => {
                self.bars.push(bar);
                true
            }
        }
    }

    /// Merge freshly fetched bars into the retained buffer.
    ///
    /// Retained bars at or after the first fresh timestamp are replaced by
    /// the fresh ones. The buffer is then capped to the newest `max_len` bars.
    pub fn merge(&mut self, fresh: &[Bar], max_len: usize) {
        if let Some(first) = fresh.first() {
            let keep = self
                .bars
                .iter()
                .position(|b| b.timestamp >= first.timestamp)
                .unwrap_or(self.bars.len());
            self.bars.truncate(keep);
            for bar in fresh {
                self.push(*bar);
            }
        }
        if self.bars.len() > max_len {
            let excess = self.bars.len() - max_len;
            self.bars.drain(..excess);
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Raw per-symbol answer from a market-data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderQuote {
    pub symbol: String,
    /// Latest traded price.
    pub price: f64,
    /// Recent bars, oldest first.
    pub bars: Vec<Bar>,
    /// Implied volatility from an options-market source, when the provider has one.
    pub implied_volatility: Option<f64>,
}

/// Latest fetched state for one symbol. Built fresh every scan cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    /// Fractional change over the last bar (1-minute with 1m bars).
    pub change_1_bar: f64,
    /// Fractional change over the last five bars (5-minute with 1m bars).
    pub change_5_bar: f64,
    /// Highest high of the last five bars.
    pub recent_high: f64,
    /// Lowest low of the last five bars.
    pub recent_low: f64,
    /// Last bar volume relative to the average of the last ten bars.
    pub volume_ratio: f64,
    pub implied_volatility: Option<f64>,
    pub history: PriceHistory,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    const RECENT_BARS: usize = 5;
    const VOLUME_BARS: usize = 10;

    /// Derive a snapshot from the provider price and the merged history.
    pub fn build(
        symbol: impl Into<String>,
        price: f64,
        implied_volatility: Option<f64>,
        history: PriceHistory,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let bars = history.bars();
        let closes = history.closes();

        let recent = &bars[bars.len().saturating_sub(Self::RECENT_BARS)..];
        let recent_high = recent.iter().map(|b| b.high).fold(f64::NAN, f64::max);
        let recent_low = recent.iter().map(|b| b.low).fold(f64::NAN, f64::min);

        let volumes = history.volumes();
        let window = &volumes[volumes.len().saturating_sub(Self::VOLUME_BARS)..];
        let avg_volume = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };
        let volume_ratio = match volumes.last() {
            Some(&last) if avg_volume > 0.0 => last / avg_volume,
            _ => 1.0,
        };

        Self {
            symbol: symbol.into(),
            price,
            change_1_bar: fractional_change(&closes, price, 1),
            change_5_bar: fractional_change(&closes, price, 5),
            recent_high: if recent_high.is_nan() { price } else { recent_high },
            recent_low: if recent_low.is_nan() { price } else { recent_low },
            volume_ratio,
            implied_volatility,
            history,
            fetched_at,
        }
    }
}

/// Change of `price` against the close `bars_back` bars before the latest one.
fn fractional_change(closes: &[f64], price: f64, bars_back: usize) -> f64 {
    if closes.len() <= bars_back {
        return 0.0;
    }
    let base = closes[closes.len() - 1 - bars_back];
    if base == 0.0 {
        0.0
    } else {
        (price - base) / base
    }
}

/// Direction of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Decisive output of the aggregator for one symbol in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    /// Share of the winning side in the total weighted score, in `[0, 1]`.
    pub confidence: f64,
    pub reference_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement returned by an execution client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    pub fill_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Current state of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    WaitingForOpen,
    Scanning,
    Closed,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::WaitingForOpen => write!(f, "waiting_for_open"),
            ScanState::Scanning => write!(f, "scanning"),
            ScanState::Closed => write!(f, "closed"),
        }
    }
}
