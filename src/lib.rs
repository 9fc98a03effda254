//! Multi-asset wallet synchronization and transaction-preparation engine.
//!
//! The engine keeps per-asset balance and transaction state consistent with a
//! remote ledger and turns user intent ("send N units to address X at fee
//! tier Y") into a signed, broadcastable transaction. Chain backends are
//! injected capability sets ([`backend`]); the engine owns the sync state
//! machine, the balance/transaction cache, fee tier feeds, and the reactive
//! send pipelines.
//!
//! Each asset is exposed through an adapter facade ([`adapter`]) combining:
//!
//! - a [`sync::SyncCoordinator`] driving periodic and on-demand sync,
//! - an [`cache::AssetCache`] holding atomic balance/history snapshots,
//! - a [`send::SendPipeline`] implementation for the asset family,
//! - a [`fees::FeeTierFeed`] caching recommended fee tiers.

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod exchanger;
pub mod fees;
pub mod market;
pub mod send;
pub mod sync;
pub mod types;

pub use adapter::{
    Adapter, BalanceAdapter, BitcoinAdapter, DepositAdapter, EthereumAdapter, TransactionsAdapter,
};
pub use config::EngineConfig;
pub use error::{AdapterError, BackendError, SendError};
pub use exchanger::{Exchanger, Side};
pub use market::MarketFeed;
pub use send::{FeeSelection, GasData, SendPipeline, TransactionCandidate};
pub use types::{AdapterState, Balance, FeeTier, FeeTierSet, TransactionRecord, TxUserData};
