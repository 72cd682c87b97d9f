use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use common::{Error, Result, ScanState, Signal, TradingWindow};
use strategy::{rank_signals, Analyzer};

use crate::fetcher::DataFetcher;

/// Wall-clock source for the trading-window gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed settings of the scan loop.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub symbols: Vec<String>,
    /// Reference index fetched with the universe and fed to the VIX strategy.
    pub vix_symbol: Option<String>,
    pub window: TradingWindow,
    pub cycle_interval: Duration,
    pub idle_interval: Duration,
}

/// What one scan cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub fetched: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub vix: Option<f64>,
    /// Emitted signals, highest confidence first.
    pub signals: Vec<Signal>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MarketClosed,
    Shutdown,
    /// The execution side dropped its receiver.
    SignalChannelClosed,
}

/// Totals reported when the loop returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub cycles: u64,
    pub signals: u64,
    pub final_state: ScanState,
    pub stop_reason: StopReason,
}

/// Gate → fetch → analyze → emit, on a fixed cadence while the market is open.
pub struct ScanLoop {
    fetcher: DataFetcher,
    analyzer: Arc<Analyzer>,
    settings: ScanSettings,
    clock: Arc<dyn Clock>,
    signal_tx: mpsc::Sender<Vec<Signal>>,
    shutdown: watch::Receiver<bool>,
    state: ScanState,
}

impl ScanLoop {
    pub fn new(
        fetcher: DataFetcher,
        analyzer: Arc<Analyzer>,
        settings: ScanSettings,
        clock: Arc<dyn Clock>,
        signal_tx: mpsc::Sender<Vec<Signal>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            settings,
            clock,
            signal_tx,
            shutdown,
            state: ScanState::WaitingForOpen,
        }
    }

    /// Run until the market closes or shutdown is requested.
    pub async fn run(mut self) -> Result<ScanSummary> {
        info!(
            symbols = self.settings.symbols.len(),
            vix = ?self.settings.vix_symbol,
            "Scan loop started"
        );
        let mut cycles = 0u64;
        let mut emitted = 0u64;

        let stop_reason = loop {
            if *self.shutdown.borrow() {
                break StopReason::Shutdown;
            }

            let state = self.settings.window.state_at(self.clock.now());
            if state != self.state {
                info!(from = %self.state, to = %state, "Scan state changed");
                self.state = state;
            }

            let pause = match state {
                ScanState::WaitingForOpen => self.settings.idle_interval,
                ScanState::Scanning => {
                    match self.run_cycle().await {
                        Ok(report) => {
                            cycles += 1;
                            emitted += report.signals.len() as u64;
                        }
                        Err(Error::ChannelClosed(what)) => {
                            warn!(channel = what, "Signal receiver gone, stopping scan loop");
                            break StopReason::SignalChannelClosed;
                        }
                        Err(e) => return Err(e),
                    }
                    self.settings.cycle_interval
                }
                ScanState::Closed => break StopReason::MarketClosed,
            };

            if self.pause(pause).await {
                break StopReason::Shutdown;
            }
        };

        let summary = ScanSummary {
            cycles,
            signals: emitted,
            final_state: self.state,
            stop_reason,
        };
        info!(
            cycles = summary.cycles,
            signals = summary.signals,
            state = %summary.final_state,
            reason = ?summary.stop_reason,
            "Scan loop finished"
        );
        Ok(summary)
    }

    /// One fetch → analyze → emit pass over the whole universe.
    ///
    /// A cycle that fetches nothing is logged and reported, not an error.
    /// Fails only when the signal receiver has been dropped.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut batch = self.settings.symbols.clone();
        if let Some(vix) = &self.settings.vix_symbol {
            if !batch.contains(vix) {
                batch.push(vix.clone());
            }
        }

        let fetch = self.fetcher.fetch_all(&batch).await;

        let vix = self
            .settings
            .vix_symbol
            .as_ref()
            .and_then(|v| fetch.snapshots.get(v))
            .map(|s| s.price);
        if self.settings.vix_symbol.is_some() && vix.is_none() {
            debug!("Reference index unavailable this cycle, using neutral level");
        }

        let now = self.clock.now();
        let mut signals: Vec<Signal> = self
            .settings
            .symbols
            .iter()
            .filter_map(|symbol| fetch.snapshots.get(symbol))
            .filter_map(|snapshot| self.analyzer.analyze(snapshot, vix, now).signal)
            .collect();
        rank_signals(&mut signals);

        if fetch.snapshots.is_empty() {
            warn!(symbols = batch.len(), "No symbols fetched this cycle");
        }

        for s in &signals {
            info!(
                symbol = %s.symbol,
                direction = %s.direction,
                confidence = s.confidence,
                price = s.reference_price,
                "Signal"
            );
        }

        if !signals.is_empty() {
            self.signal_tx
                .send(signals.clone())
                .await
                .map_err(|_| Error::ChannelClosed("signals"))?;
        }

        let report = CycleReport {
            fetched: fetch.fetched(),
            failed: fetch.failed.len(),
            timed_out: fetch.timed_out.len(),
            vix,
            signals,
            elapsed: fetch.elapsed,
        };
        info!(
            fetched = report.fetched,
            failed = report.failed,
            timed_out = report.timed_out,
            signals = report.signals.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Sleep for `duration` unless shutdown arrives first. Returns `true` on shutdown.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = self.shutdown.changed() => match changed {
                Ok(()) => *self.shutdown.borrow(),
                // Nobody can request shutdown any more; the owner went away.
                Err(_) => true,
            },
        }
    }
}
