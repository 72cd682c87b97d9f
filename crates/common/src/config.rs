use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::{Error, Result, ScanState};

/// All runtime configuration loaded from environment variables at startup.
/// Loaded once before the scan loop starts and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    // Universe
    pub symbols: Vec<String>,
    /// Reference volatility index fetched alongside the universe. `None` disables it.
    pub vix_symbol: Option<String>,

    // Market data
    pub market_data_url: String,
    pub history_range: String,
    pub bar_interval: String,
    pub request_timeout: Duration,

    // Fetch batch
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub max_history: usize,

    // Scan loop
    pub cycle_interval: Duration,
    pub idle_interval: Duration,
    pub trading_window: TradingWindow,

    // Strategy config file path
    pub strategy_config_path: String,

    // Paper execution
    pub paper_notional_usd: f64,
    pub paper_slippage_bps: f64,
}

const DEFAULT_SYMBOLS: &str = "AAPL,MSFT,GOOGL,AMZN,META,NVDA,TSLA,JPM,BAC,WMT";

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let symbols = parse_symbols(&get("SYMBOLS").unwrap_or_else(|| DEFAULT_SYMBOLS.to_string()));
        if symbols.is_empty() {
            return Err(Error::Config("SYMBOLS must name at least one symbol".into()));
        }

        let vix_symbol = match lookup("VIX_SYMBOL") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.trim().to_string()),
            None => Some("^VIX".to_string()),
        };

        let fetch_concurrency: usize = parse_or(&get, "FETCH_CONCURRENCY", 16)?;
        if fetch_concurrency == 0 {
            return Err(Error::Config("FETCH_CONCURRENCY must be at least 1".into()));
        }
        let max_history: usize = parse_or(&get, "MAX_HISTORY", 250)?;
        if max_history == 0 {
            return Err(Error::Config("MAX_HISTORY must be at least 1".into()));
        }

        let paper_notional_usd: f64 = parse_or(&get, "PAPER_NOTIONAL_USD", 1_000_000.0)?;
        if paper_notional_usd <= 0.0 {
            return Err(Error::Config("PAPER_NOTIONAL_USD must be positive".into()));
        }

        let paper_slippage_bps: f64 = parse_or(&get, "PAPER_SLIPPAGE_BPS", 0.0)?;
        if !(0.0..10_000.0).contains(&paper_slippage_bps) {
            return Err(Error::Config("PAPER_SLIPPAGE_BPS must be within [0, 10000)".into()));
        }

        let trading_window = TradingWindow::parse(
            &get("MARKET_TZ").unwrap_or_else(|| "America/New_York".to_string()),
            &get("MARKET_OPEN").unwrap_or_else(|| "09:30".to_string()),
            &get("MARKET_CLOSE").unwrap_or_else(|| "16:00".to_string()),
        )?;

        Ok(Config {
            symbols,
            vix_symbol,
            market_data_url: get("MARKET_DATA_URL")
                .unwrap_or_else(|| "https://query1.finance.yahoo.com".to_string()),
            history_range: get("HISTORY_RANGE").unwrap_or_else(|| "3mo".to_string()),
            bar_interval: get("BAR_INTERVAL").unwrap_or_else(|| "1d".to_string()),
            request_timeout: positive_secs(&get, "REQUEST_TIMEOUT_SECS", 10)?,
            fetch_concurrency,
            fetch_timeout: positive_secs(&get, "FETCH_TIMEOUT_SECS", 30)?,
            max_history,
            cycle_interval: positive_secs(&get, "CYCLE_INTERVAL_SECS", 5)?,
            idle_interval: positive_secs(&get, "IDLE_INTERVAL_SECS", 30)?,
            trading_window,
            strategy_config_path: get("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            paper_notional_usd,
            paper_slippage_bps,
        })
    }
}

/// Split a comma-separated universe, dropping blanks and duplicates.
fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for s in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !s.is_empty() && !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    symbols
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
    }
}

/// Whole seconds that must not be zero.
fn positive_secs<G>(get: &G, key: &str, default: u64) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match parse_or(get, key, default)? {
        0 => Err(Error::Config(format!("{key} must be at least 1"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Daily session bounds in a fixed reference timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl TradingWindow {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open >= close {
            return Err(Error::Config(format!(
                "market open {open} must be before market close {close}"
            )));
        }
        Ok(Self { tz, open, close })
    }

    pub fn parse(tz: &str, open: &str, close: &str) -> Result<Self> {
        let tz: Tz = tz
            .parse()
            .map_err(|_| Error::Config(format!("invalid timezone: '{tz}'")))?;
        let open = parse_time(open)?;
        let close = parse_time(close)?;
        Self::new(tz, open, close)
    }

    /// Scan-loop state implied by the wall-clock instant `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> ScanState {
        let local = now.with_timezone(&self.tz).time();
        if local < self.open {
            ScanState::WaitingForOpen
        } else if local < self.close {
            ScanState::Scanning
        } else {
            ScanState::Closed
        }
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| Error::Config(format!("invalid time of day: '{raw}' (expected HH:MM)")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.symbols.len(), 10);
        assert_eq!(cfg.vix_symbol.as_deref(), Some("^VIX"));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(30));
        assert_eq!(cfg.cycle_interval, Duration::from_secs(5));
        assert_eq!(cfg.trading_window.tz, chrono_tz::America::New_York);
    }

    #[test]
    fn symbols_are_trimmed_uppercased_and_deduplicated() {
        let cfg = Config::from_lookup(lookup(&[("SYMBOLS", " aapl, MSFT,,AAPL ")])).unwrap();
        assert_eq!(cfg.symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn blank_vix_symbol_disables_reference() {
        let cfg = Config::from_lookup(lookup(&[("VIX_SYMBOL", "")])).unwrap();
        assert!(cfg.vix_symbol.is_none());
    }

    #[test]
    fn invalid_number_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("FETCH_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("FETCH_CONCURRENCY", "0")])).is_err());
    }

    #[test]
    fn zero_timeouts_and_intervals_are_rejected() {
        for key in [
            "FETCH_TIMEOUT_SECS",
            "REQUEST_TIMEOUT_SECS",
            "CYCLE_INTERVAL_SECS",
            "IDLE_INTERVAL_SECS",
        ] {
            match Config::from_lookup(lookup(&[(key, "0")])) {
                Err(Error::Config(msg)) => assert!(msg.contains(key), "{msg}"),
                other => panic!("{key}=0 accepted: {other:?}"),
            }
        }
        let cfg = Config::from_lookup(lookup(&[("CYCLE_INTERVAL_SECS", "1")])).unwrap();
        assert_eq!(cfg.cycle_interval, Duration::from_secs(1));
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        assert!(TradingWindow::parse("America/New_York", "16:00", "09:30").is_err());
        assert!(TradingWindow::parse("Mars/Olympus", "09:30", "16:00").is_err());
    }

    #[test]
    fn window_state_follows_local_clock() {
        let window = TradingWindow::parse("America/New_York", "09:30", "16:00").unwrap();
        // 2026-03-16 is after the US DST switch: New York is UTC-4.
        let at = |h, m| Utc.with_ymd_and_hms(2026, 3, 16, h, m, 0).unwrap();
        assert_eq!(window.state_at(at(13, 29)), ScanState::WaitingForOpen);
        assert_eq!(window.state_at(at(13, 30)), ScanState::Scanning);
        assert_eq!(window.state_at(at(19, 59)), ScanState::Scanning);
        assert_eq!(window.state_at(at(20, 0)), ScanState::Closed);
    }
}
