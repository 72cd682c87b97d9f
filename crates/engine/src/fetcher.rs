use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use common::{Error, MarketDataProvider, MarketSnapshot, PriceHistory, ProviderQuote, Result};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upper bound on provider calls in flight at once.
    pub max_concurrency: usize,
    /// Budget for the whole batch, not per symbol.
    pub timeout: Duration,
    /// Bars retained per symbol across cycles.
    pub max_history: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            timeout: Duration::from_secs(30),
            max_history: 250,
        }
    }
}

/// Outcome of one batch fetch.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Only symbols fetched successfully within the budget.
    pub snapshots: HashMap<String, MarketSnapshot>,
    /// Symbols whose fetch failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Symbols still outstanding when the deadline fired.
    pub timed_out: Vec<String>,
    pub elapsed: Duration,
}

impl FetchReport {
    pub fn fetched(&self) -> usize {
        self.snapshots.len()
    }
}

/// Fans symbol fetches out to a bounded pool and collects whatever arrives
/// before the batch deadline.
///
/// The fetcher is the only owner of the per-symbol history buffers; each
/// successful fetch is merged into them and a fresh snapshot is built from
/// the merged buffer.
pub struct DataFetcher {
    provider: Arc<dyn MarketDataProvider>,
    config: FetchConfig,
    history: HashMap<String, PriceHistory>,
}

impl DataFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: FetchConfig) -> Self {
        Self {
            provider,
            config,
            history: HashMap::new(),
        }
    }

    /// Retained history for `symbol`, if any fetch ever succeeded.
    pub fn history(&self, symbol: &str) -> Option<&PriceHistory> {
        self.history.get(symbol)
    }

    /// Fetch every symbol once, bounded by the configured concurrency and deadline.
    ///
    /// Never fails as a whole: failed and timed-out symbols are simply absent
    /// from `snapshots` and listed in the report.
    pub async fn fetch_all(&mut self, symbols: &[String]) -> FetchReport {
        let started = Instant::now();
        let deadline = started + self.config.timeout;

        let mut seen = HashSet::new();
        let symbols: Vec<&String> = symbols.iter().filter(|s| seen.insert(s.as_str())).collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(String, Result<ProviderQuote>)>(symbols.len().max(1));
        let mut tasks = JoinSet::new();

        for symbol in &symbols {
            let symbol = (*symbol).clone();
            let provider = self.provider.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = provider.fetch(&symbol).await;
                let _ = tx.send((symbol, result)).await;
            });
        }
        // Only the workers hold senders now; `recv` yields `None` once all are done.
        drop(tx);

        let mut report = FetchReport::default();
        let mut pending: HashSet<String> = symbols.iter().map(|s| (*s).clone()).collect();
        let mut deadline_hit = false;

        loop {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some((symbol, result))) => {
                    pending.remove(&symbol);
                    match result.and_then(|quote| self.accept(&symbol, quote)) {
                        Ok(snapshot) => {
                            report.snapshots.insert(symbol, snapshot);
                        }
                        Err(e) => {
                            warn!(symbol = %symbol, error = %e, "Fetch failed");
                            report.failed.push((symbol, e.to_string()));
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    break;
                }
            }
        }
        tasks.abort_all();

        // Keep the caller's order in the diagnostic lists.
        for symbol in symbols {
            if !pending.contains(symbol) {
                continue;
            }
            if deadline_hit {
                report.timed_out.push(symbol.clone());
            } else {
                let reason = "fetch task ended without a result".to_string();
                warn!(symbol = %symbol, "{reason}");
                report.failed.push((symbol.clone(), reason));
            }
        }
        if !report.timed_out.is_empty() {
            warn!(
                count = report.timed_out.len(),
                symbols = ?report.timed_out,
                timeout_secs = self.config.timeout.as_secs_f64(),
                "Fetch deadline reached, dropping outstanding symbols"
            );
        }

        report.elapsed = started.elapsed();
        debug!(
            fetched = report.fetched(),
            failed = report.failed.len(),
            timed_out = report.timed_out.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Fetch batch complete"
        );
        report
    }

    /// Validate a quote, merge its bars and build the symbol's snapshot.
    fn accept(&mut self, symbol: &str, quote: ProviderQuote) -> Result<MarketSnapshot> {
        if !quote.price.is_finite() || quote.price <= 0.0 {
            return Err(Error::Provider {
                symbol: symbol.to_string(),
                reason: format!("non-positive price {}", quote.price),
            });
        }
        let history = self.history.entry(symbol.to_string()).or_default();
        history.merge(&quote.bars, self.config.max_history);
        Ok(MarketSnapshot::build(
            symbol,
            quote.price,
            quote.implied_volatility,
            history.clone(),
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use common::Bar;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn bar(day: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2026, 2, 2, 21, 0, 0).unwrap() + chrono::Duration::days(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        }
    }

    /// Answers instantly unless the symbol is listed as slow or failing.
    #[derive(Default)]
    struct FakeProvider {
        slow: HashSet<String>,
        failing: HashSet<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeProvider {
        fn with_slow(symbols: &[&str]) -> Self {
            Self {
                slow: symbols.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for FakeProvider {
        async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.slow.contains(symbol) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            } else if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(symbol) {
                return Err(Error::Http(format!("503 for {symbol}")));
            }
            Ok(ProviderQuote {
                symbol: symbol.to_string(),
                price: 100.0,
                bars: vec![bar(0, 99.0), bar(1, 100.0)],
                implied_volatility: None,
            })
        }
    }

    /// Returns the next scripted batch of bars on every call.
    struct ScriptedProvider {
        batches: Mutex<Vec<Vec<Bar>>>,
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
            let bars = {
                let mut batches = self.batches.lock().unwrap();
                if batches.is_empty() {
                    Vec::new()
                } else {
                    batches.remove(0)
                }
            };
            let price = bars.last().map(|b| b.close).unwrap_or(1.0);
            Ok(ProviderQuote {
                symbol: symbol.to_string(),
                price,
                bars,
                implied_volatility: None,
            })
        }
    }

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("SYM{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn slow_symbols_are_dropped_at_the_deadline() {
        let provider = FakeProvider::with_slow(&["SYM2", "SYM5", "SYM8"]);
        let config = FetchConfig {
            timeout: Duration::from_secs(5),
            ..FetchConfig::default()
        };
        let mut fetcher = DataFetcher::new(Arc::new(provider), config);

        let report = fetcher.fetch_all(&symbols(10)).await;

        assert_eq!(report.snapshots.len(), 7);
        assert!(!report.snapshots.contains_key("SYM2"));
        assert_eq!(report.timed_out, vec!["SYM2", "SYM5", "SYM8"]);
        assert!(report.failed.is_empty());
        assert!(report.elapsed <= Duration::from_secs(5) + Duration::from_millis(10));
    }

    /// Never answers; counts how many of its futures were dropped.
    #[derive(Default)]
    struct HangingProvider {
        dropped: Arc<AtomicUsize>,
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MarketDataProvider for HangingProvider {
        async fn fetch(&self, _symbol: &str) -> Result<ProviderQuote> {
            let _guard = DropCounter(self.dropped.clone());
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(Error::Timeout(Duration::from_secs(3600)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_in_flight_fetches() {
        let provider = HangingProvider::default();
        let dropped = provider.dropped.clone();
        let config = FetchConfig {
            timeout: Duration::from_secs(1),
            ..FetchConfig::default()
        };
        let mut fetcher = DataFetcher::new(Arc::new(provider), config);

        let symbols: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let report = fetcher.fetch_all(&symbols).await;
        assert_eq!(report.timed_out, vec!["A", "B", "C"]);

        // Aborted tasks drop their futures the next time the runtime runs them.
        for _ in 0..10 {
            if dropped.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported_not_zero_filled() {
        let provider = FakeProvider {
            failing: ["SYM1".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let mut fetcher = DataFetcher::new(Arc::new(provider), FetchConfig::default());

        let report = fetcher.fetch_all(&symbols(3)).await;

        assert_eq!(report.snapshots.len(), 2);
        assert!(!report.snapshots.contains_key("SYM1"));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "SYM1");
        assert!(report.timed_out.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let config = FetchConfig {
            max_concurrency: 3,
            timeout: Duration::from_secs(30),
            ..FetchConfig::default()
        };
        let mut fetcher = DataFetcher::new(provider.clone(), config);

        let report = fetcher.fetch_all(&symbols(10)).await;

        assert_eq!(report.fetched(), 10);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 3);
        // four waves of at most three one-second fetches
        assert!(report.elapsed >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn duplicate_symbols_are_fetched_once() {
        let mut fetcher = DataFetcher::new(Arc::new(FakeProvider::default()), FetchConfig::default());
        let report = fetcher
            .fetch_all(&["AAPL".to_string(), "AAPL".to_string()])
            .await;
        assert_eq!(report.fetched(), 1);
    }

    #[tokio::test]
    async fn history_is_retained_and_merged_across_cycles() {
        let provider = ScriptedProvider {
            batches: Mutex::new(vec![
                vec![bar(0, 10.0), bar(1, 11.0), bar(2, 12.0)],
                vec![bar(2, 12.5), bar(3, 13.0)],
            ]),
        };
        let config = FetchConfig {
            max_history: 3,
            ..FetchConfig::default()
        };
        let mut fetcher = DataFetcher::new(Arc::new(provider), config);
        let universe = vec!["AAPL".to_string()];

        fetcher.fetch_all(&universe).await;
        let report = fetcher.fetch_all(&universe).await;

        let snap = &report.snapshots["AAPL"];
        assert_eq!(snap.history.closes(), vec![11.0, 12.5, 13.0]);
        assert_eq!(snap.price, 13.0);
        assert_eq!(fetcher.history("AAPL").map(|h| h.len()), Some(3));
    }

    #[tokio::test]
    async fn non_positive_price_is_a_failure() {
        let provider = ScriptedProvider {
            batches: Mutex::new(vec![vec![bar(0, 0.0)]]),
        };
        let mut fetcher = DataFetcher::new(Arc::new(provider), FetchConfig::default());
        let report = fetcher.fetch_all(&["ZERO".to_string()]).await;
        assert!(report.snapshots.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(fetcher.history("ZERO").is_none());
    }
}
