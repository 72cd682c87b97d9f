use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use common::{Direction, ExecutionClient, OrderAck, Result, Signal};

/// Why a signal was not turned into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The symbol was ordered less than one cooldown ago.
    Cooldown,
    /// An open position in the same direction already exists.
    AlreadyPositioned,
    /// Opening the symbol would exceed the open-position cap.
    MaxPositions,
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Placed(OrderAck),
    Skipped(SkipReason),
    Failed(String),
}

/// Receives signal batches from the scan loop and places orders.
///
/// This is the ONLY component that calls `ExecutionClient::place_order`.
pub struct SignalDispatcher {
    signal_rx: mpsc::Receiver<Vec<Signal>>,
    client: Arc<dyn ExecutionClient>,
    cooldown: Duration,
    max_positions: usize,
    last_order: HashMap<String, Instant>,
    positions: HashMap<String, Direction>,
}

impl SignalDispatcher {
    pub fn new(
        signal_rx: mpsc::Receiver<Vec<Signal>>,
        client: Arc<dyn ExecutionClient>,
        cooldown: Duration,
        max_positions: usize,
    ) -> Self {
        Self {
            signal_rx,
            client,
            cooldown,
            max_positions,
            last_order: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Run the dispatch loop until the scan loop drops its sender.
    /// Call from `tokio::spawn`.
    pub async fn run(mut self) -> Result<()> {
        self.client.connect().await?;
        info!(
            cooldown_secs = self.cooldown.as_secs(),
            max_positions = self.max_positions,
            "SignalDispatcher running"
        );

        while let Some(batch) = self.signal_rx.recv().await {
            debug!(signals = batch.len(), "Dispatching batch");
            for signal in &batch {
                self.dispatch(signal).await;
            }
        }
        warn!("SignalDispatcher: signal channel closed");
        Ok(())
    }

    /// Place one order unless the symbol is cooling down, already positioned,
    /// or would open a position past the cap. Failures are logged, never fatal.
    pub async fn dispatch(&mut self, signal: &Signal) -> DispatchOutcome {
        if let Some(at) = self.last_order.get(&signal.symbol) {
            if at.elapsed() < self.cooldown {
                debug!(symbol = %signal.symbol, "Skipping signal, symbol in cooldown");
                return DispatchOutcome::Skipped(SkipReason::Cooldown);
            }
        }
        if self.positions.get(&signal.symbol) == Some(&signal.direction) {
            debug!(
                symbol = %signal.symbol,
                direction = %signal.direction,
                "Skipping signal, position already open"
            );
            return DispatchOutcome::Skipped(SkipReason::AlreadyPositioned);
        }
        // Flipping a held symbol does not add a position.
        if !self.positions.contains_key(&signal.symbol) && self.positions.len() >= self.max_positions {
            debug!(
                symbol = %signal.symbol,
                open = self.positions.len(),
                "Skipping signal, position cap reached"
            );
            return DispatchOutcome::Skipped(SkipReason::MaxPositions);
        }

        match self.client.place_order(signal).await {
            Ok(ack) => {
                info!(
                    symbol = %ack.symbol,
                    direction = %ack.direction,
                    qty = ack.quantity,
                    price = ack.fill_price,
                    order_id = %ack.order_id,
                    "Order placed"
                );
                self.last_order.insert(signal.symbol.clone(), Instant::now());
                self.positions.insert(signal.symbol.clone(), ack.direction);
                DispatchOutcome::Placed(ack)
            }
            Err(e) => {
                error!(symbol = %signal.symbol, error = %e, "Order placement failed");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
