//! Core data model shared across the engine.

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lifecycle state of an asset adapter. Written only by the sync coordinator
/// (after the one-time `Empty` -> `Loaded` flip at construction), read by any
/// component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState {
    Empty,
    Loaded,
    Syncing,
    Synced,
    Failed(String),
}

impl AdapterState {
    /// Whether a sync trigger may start a sync from this state. `Empty` means
    /// the backend is not wired up yet; `Syncing` means one is already in
    /// flight.
    pub fn is_syncable(&self) -> bool {
        !matches!(self, AdapterState::Empty | AdapterState::Syncing)
    }
}

/// Amount in the asset's smallest unit (sats, wei) plus the decimal exponent
/// used for display conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub units: u128,
    pub decimals: u8,
}

impl Balance {
    pub fn new(units: u128, decimals: u8) -> Self {
        Self { units, decimals }
    }

    /// Whole-coin representation, e.g. 150_000_000 sats -> 1.5.
    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(BigInt::from(self.units), self.decimals as i64)
    }
}

/// User-editable annotations attached to a transaction record: free-form
/// notes, labels, and the fiat price of the asset recorded when the record
/// was created.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TxUserData {
    pub notes: Option<String>,
    pub labels: Vec<String>,
    pub price: Option<BigDecimal>,
}

/// Normalized cross-chain transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: String,
    /// `None` while the transaction is unconfirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Signed amount in smallest units; negative for outgoing transfers.
    pub amount: i128,
    pub from: Option<String>,
    pub to: Option<String>,
    pub fee: Option<u128>,
    #[serde(default)]
    pub user_data: TxUserData,
}

impl TransactionRecord {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    /// Synthetic unconfirmed-sent record inserted into the cache right after
    /// a successful broadcast, before the backend has observed the
    /// transaction.
    pub fn unconfirmed_sent(
        txid: &str,
        recipient: &str,
        amount: u128,
        fee: u128,
        price: Option<BigDecimal>,
    ) -> Self {
        Self {
            txid: txid.to_string(),
            confirmed_at: None,
            amount: -((amount + fee) as i128),
            from: None,
            to: Some(recipient.to_string()),
            fee: Some(fee),
            user_data: TxUserData {
                notes: None,
                labels: Vec::new(),
                price,
            },
        }
    }
}

/// Canonical history ordering: unconfirmed entries ahead of all confirmed
/// ones, confirmed entries descending by confirmation time. The sort is
/// stable, so unconfirmed entries keep their insertion order (the documented
/// tiebreak).
pub fn sort_records(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| match (a.confirmed_at, b.confirmed_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(ta), Some(tb)) => tb.cmp(&ta),
    });
}

/// Named speed/cost tradeoff for transaction inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Fast,
    Normal,
    Slow,
}

/// Absolute fee rates per tier: sat/vByte for UTXO chains, gas price for
/// account chains. Replaced wholesale on each successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTierSet {
    pub fast: u64,
    pub normal: u64,
    pub slow: u64,
}

impl FeeTierSet {
    pub fn rate(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::Fast => self.fast,
            FeeTier::Normal => self.normal,
            FeeTier::Slow => self.slow,
        }
    }
}
