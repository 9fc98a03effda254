//! Consumption surface for the external market price push.

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use tokio::sync::watch;

/// Read-only view of externally pushed `{asset -> fiat price}` snapshots.
///
/// The price collaborator calls [`push`](Self::push); the engine (exchanger,
/// send pipelines) only reads. Snapshots are replaced wholesale.
pub struct MarketFeed {
    prices_tx: watch::Sender<HashMap<String, BigDecimal>>,
}

impl MarketFeed {
    pub fn new() -> Self {
        let (prices_tx, _) = watch::channel(HashMap::new());
        Self { prices_tx }
    }

    /// Publish a fresh snapshot of asset prices.
    pub fn push(&self, prices: HashMap<String, BigDecimal>) {
        self.prices_tx.send_replace(prices);
    }

    pub fn price(&self, symbol: &str) -> Option<BigDecimal> {
        self.prices_tx.borrow().get(symbol).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<HashMap<String, BigDecimal>> {
        self.prices_tx.subscribe()
    }
}

impl Default for MarketFeed {
    fn default() -> Self {
        Self::new()
    }
}
