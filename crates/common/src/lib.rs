pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::{Config, TradingWindow};
pub use error::{Error, Result};
pub use provider::{ExecutionClient, MarketDataProvider};
pub use types::*;
