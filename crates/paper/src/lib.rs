use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Direction, Error, ExecutionClient, OrderAck, Result, Signal};

/// Share of the notional committed per order at confidence 1.0.
const POSITION_FRACTION: f64 = 0.02;

/// Simulated open position held by the paper account.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

/// Simulated broker for paper trading.
///
/// Orders fill immediately at the signal's reference price, adjusted by
/// slippage. Nothing leaves the process.
pub struct PaperClient {
    notional_usd: f64,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
    connected: AtomicBool,
    fills: Arc<RwLock<Vec<OrderAck>>>,
    /// One position per symbol; a fill in the other direction replaces it.
    positions: Arc<RwLock<HashMap<String, PaperPosition>>>,
}

impl PaperClient {
    pub fn new(notional_usd: f64, slippage_bps: f64) -> Self {
        info!(notional = notional_usd, slippage_bps, "PaperClient initialized");
        Self {
            notional_usd,
            slippage_bps,
            connected: AtomicBool::new(false),
            fills: Arc::new(RwLock::new(Vec::new())),
            positions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whole shares for `signal`: notional × 2% × confidence / price, floored.
    pub fn quantity_for(&self, signal: &Signal) -> u64 {
        if !(signal.reference_price.is_finite() && signal.reference_price > 0.0) {
            return 0;
        }
        let raw = self.notional_usd * POSITION_FRACTION * signal.confidence / signal.reference_price;
        if raw.is_finite() && raw >= 1.0 {
            raw.floor() as u64
        } else {
            0
        }
    }

    pub async fn fills(&self) -> Vec<OrderAck> {
        self.fills.read().await.clone()
    }

    pub async fn positions(&self) -> Vec<PaperPosition> {
        let mut positions: Vec<PaperPosition> = self.positions.read().await.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }
}

#[async_trait]
impl ExecutionClient for PaperClient {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Paper account connected");
        Ok(())
    }

    async fn place_order(&self, signal: &Signal) -> Result<OrderAck> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::OrderRejected("paper account not connected".into()));
        }
        let quantity = self.quantity_for(signal);
        if quantity == 0 {
            return Err(Error::OrderRejected(format!(
                "{} order size rounds to zero at price {}",
                signal.symbol, signal.reference_price
            )));
        }

        // Buys pay more, sells receive less
        let fill_price = match signal.direction {
            Direction::Long => signal.reference_price * (1.0 + self.slippage_bps / 10_000.0),
            Direction::Short => signal.reference_price * (1.0 - self.slippage_bps / 10_000.0),
        };

        let ack = OrderAck {
            order_id: uuid::Uuid::new_v4().to_string(),
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            quantity,
            fill_price,
            timestamp: Utc::now(),
        };
        debug!(
            symbol = %ack.symbol,
            direction = %ack.direction,
            qty = quantity,
            fill = fill_price,
            "Paper fill simulated"
        );

        self.positions.write().await.insert(
            ack.symbol.clone(),
            PaperPosition {
                symbol: ack.symbol.clone(),
                direction: ack.direction,
                quantity,
                entry_price: fill_price,
                opened_at: ack.timestamp,
            },
        );
        self.fills.write().await.push(ack.clone());
        Ok(ack)
    }
}
