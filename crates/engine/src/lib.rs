pub mod executor;
pub mod fetcher;
pub mod lifecycle;
pub mod yahoo;

pub use executor::{DispatchOutcome, SignalDispatcher, SkipReason};
pub use fetcher::{DataFetcher, FetchConfig, FetchReport};
pub use lifecycle::{Clock, CycleReport, ScanLoop, ScanSettings, ScanSummary, StopReason, SystemClock};
pub use yahoo::YahooChartClient;
