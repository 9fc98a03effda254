//! Per-asset adapter facades.
//!
//! An adapter bundles a backend, a sync coordinator, a cache, a fee tier feed
//! and a send pipeline behind small role traits, so a caller can hold e.g. a
//! list of `dyn BalanceAdapter` across asset families.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::BackendError;
use crate::types::{AdapterState, Balance, TransactionRecord};

mod bitcoin;
mod ethereum;

pub use self::bitcoin::BitcoinAdapter;
pub use self::ethereum::EthereumAdapter;

/// Lifecycle control shared by all adapters.
pub trait Adapter: Send + Sync {
    /// Enable periodic syncing and trigger an initial sync.
    fn start(&self);

    /// Suspend periodic syncing. Cached values stay readable.
    fn stop(&self);

    /// Force an immediate sync.
    fn refresh(&self);
}

pub trait BalanceAdapter: Adapter {
    fn state(&self) -> AdapterState;

    fn balance(&self) -> Balance;

    fn subscribe_state(&self) -> watch::Receiver<AdapterState>;

    fn subscribe_balance(&self) -> watch::Receiver<Balance>;
}

pub trait TransactionsAdapter: Adapter {
    fn transaction_records(&self) -> Arc<Vec<TransactionRecord>>;

    fn subscribe_transactions(&self) -> watch::Receiver<Arc<Vec<TransactionRecord>>>;
}

#[async_trait]
pub trait DepositAdapter: Adapter {
    async fn receive_address(&self) -> Result<String, BackendError>;
}
