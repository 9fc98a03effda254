//! Per-asset balance and transaction snapshot store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::types::{Balance, TransactionRecord};

/// Authoritative per-asset snapshot of balance and transaction history.
///
/// Single writer (the sync coordinator, plus the send pipeline for the
/// synthetic unconfirmed record), many readers. Every update is published as
/// one whole-value replacement through a watch channel, so a reader can never
/// observe a half-applied update.
pub struct AssetCache {
    balance_tx: watch::Sender<Balance>,
    records_tx: watch::Sender<Arc<Vec<TransactionRecord>>>,
    /// Hashes of locally inserted unconfirmed records the backend has not
    /// reported back yet.
    pending: Mutex<HashSet<String>>,
}

impl AssetCache {
    pub fn new(decimals: u8) -> Self {
        let (balance_tx, _) = watch::channel(Balance::new(0, decimals));
        let (records_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            balance_tx,
            records_tx,
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn decimals(&self) -> u8 {
        self.balance_tx.borrow().decimals
    }

    pub fn current_balance(&self) -> Balance {
        *self.balance_tx.borrow()
    }

    pub fn current_transactions(&self) -> Arc<Vec<TransactionRecord>> {
        self.records_tx.borrow().clone()
    }

    pub fn subscribe_balance(&self) -> watch::Receiver<Balance> {
        self.balance_tx.subscribe()
    }

    pub fn subscribe_transactions(&self) -> watch::Receiver<Arc<Vec<TransactionRecord>>> {
        self.records_tx.subscribe()
    }

    /// Replace the snapshot with a fresh backend view.
    ///
    /// Synthetic unconfirmed records the backend has not observed yet are
    /// carried over ahead of the fresh list; once the backend reports a
    /// record with the same hash, the backend's version wins and the
    /// synthetic one is dropped.
    pub(crate) fn replace(&self, balance: Balance, records: Vec<TransactionRecord>) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        let reported: HashSet<&str> = records.iter().map(|r| r.txid.as_str()).collect();
        pending.retain(|txid| !reported.contains(txid.as_str()));

        let current = self.records_tx.borrow().clone();
        let mut merged: Vec<TransactionRecord> = current
            .iter()
            .filter(|r| pending.contains(&r.txid))
            .cloned()
            .collect();
        merged.extend(records);

        self.records_tx.send_replace(Arc::new(merged));
        self.balance_tx.send_replace(balance);
    }

    /// Prepend a synthetic unconfirmed record after a successful broadcast.
    pub(crate) fn insert_unconfirmed(&self, record: TransactionRecord) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.insert(record.txid.clone());

        let current = self.records_tx.borrow().clone();
        let mut merged = Vec::with_capacity(current.len() + 1);
        merged.push(record);
        merged.extend(current.iter().cloned());
        self.records_tx.send_replace(Arc::new(merged));
    }
}
