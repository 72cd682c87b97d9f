use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, Signal};
use engine::{
    DataFetcher, FetchConfig, ScanLoop, ScanSettings, SignalDispatcher, SystemClock,
    YahooChartClient,
};
use paper::PaperClient;
use strategy::{Analyzer, StrategyFileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    info!(
        symbols = cfg.symbols.len(),
        window = %format!("{}-{} {}", cfg.trading_window.open, cfg.trading_window.close, cfg.trading_window.tz),
        "VolScan starting"
    );

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading {}", cfg.strategy_config_path))?;
    let analyzer = Analyzer::from_config(&strategy_file).context("building strategies")?;
    if analyzer.strategies().is_empty() {
        warn!("No strategies enabled, no signal will ever be emitted");
    }

    // ── Market data ───────────────────────────────────────────────────────────
    let provider = YahooChartClient::new(
        &cfg.market_data_url,
        cfg.history_range.clone(),
        cfg.bar_interval.clone(),
        cfg.request_timeout,
    )?;
    let fetcher = DataFetcher::new(
        Arc::new(provider),
        FetchConfig {
            max_concurrency: cfg.fetch_concurrency,
            timeout: cfg.fetch_timeout,
            max_history: cfg.max_history,
        },
    );

    // ── Execution ─────────────────────────────────────────────────────────────
    let (signal_tx, signal_rx) = mpsc::channel::<Vec<Signal>>(64);
    let client = Arc::new(PaperClient::new(cfg.paper_notional_usd, cfg.paper_slippage_bps));
    let dispatcher = SignalDispatcher::new(
        signal_rx,
        client,
        strategy_file.cooldown(),
        strategy_file.max_positions,
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // ── Scan loop ─────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scan = ScanLoop::new(
        fetcher,
        Arc::new(analyzer),
        ScanSettings {
            symbols: cfg.symbols.clone(),
            vix_symbol: cfg.vix_symbol.clone(),
            window: cfg.trading_window,
            cycle_interval: cfg.cycle_interval,
            idle_interval: cfg.idle_interval,
        },
        Arc::new(SystemClock),
        signal_tx,
        shutdown_rx,
    );
    let mut scan_handle = tokio::spawn(scan.run());

    let summary = tokio::select! {
        res = &mut scan_handle => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            scan_handle.await
        }
    };
    let summary = summary.context("scan loop task panicked")??;
    info!(cycles = summary.cycles, signals = summary.signals, "Scan finished");

    // The scan loop dropped its sender; the dispatcher drains and returns.
    match dispatcher_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Dispatcher stopped with an error"),
        Err(e) => error!(error = %e, "Dispatcher task panicked"),
    }

    info!("Exiting.");
    Ok(())
}
