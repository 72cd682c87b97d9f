use async_trait::async_trait;

use crate::{OrderAck, ProviderQuote, Result, Signal};

/// Abstraction over the external market-data source.
///
/// `YahooChartClient` in `crates/engine` implements this against the Yahoo
/// chart API; tests plug in scripted fakes. A call may fail with a transport
/// or parsing error; the caller decides what a failure means for the cycle.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the current price and recent bars for one symbol.
    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote>;
}

/// Abstraction over the execution side that consumes emitted signals.
///
/// `PaperClient` implements this for simulation. Only `SignalDispatcher` in
/// `crates/engine` holds a `dyn ExecutionClient`.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Establish the session with the broker. Called once before the first order.
    async fn connect(&self) -> Result<()>;

    /// Turn a signal into an order and return the fill confirmation.
    async fn place_order(&self, signal: &Signal) -> Result<OrderAck>;
}
