//! Per-asset sync coordinator.
//!
//! One background worker per adapter owns the whole sync lifecycle: a
//! repeating interval tick and a manual refresh trigger both funnel into the
//! same task, so at most one sync is ever in flight and every cache
//! replacement is totally ordered by completion time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::WalletBackend;
use crate::cache::AssetCache;
use crate::error::BackendError;
use crate::types::{sort_records, AdapterState, Balance, TransactionRecord};

/// State machine: `Empty -> Loaded -> {Syncing <-> Synced, Syncing -> Failed}`.
///
/// - a trigger (tick or [`refresh`](SyncCoordinator::refresh)) is ignored in
///   `Empty` and `Syncing`;
/// - `Failed` never blocks the next trigger;
/// - interval ticks that arrive while a sync runs are dropped, not queued.
pub struct SyncCoordinator {
    inner: Arc<Inner>,
    worker: JoinHandle<()>,
}

struct Inner {
    backend: Arc<dyn WalletBackend>,
    cache: Arc<AssetCache>,
    state_tx: watch::Sender<AdapterState>,
    refresh: Notify,
    started: AtomicBool,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SyncCoordinator {
    pub fn new(
        backend: Arc<dyn WalletBackend>,
        cache: Arc<AssetCache>,
        interval: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(AdapterState::Empty);
        let inner = Arc::new(Inner {
            backend,
            cache,
            state_tx,
            refresh: Notify::new(),
            started: AtomicBool::new(false),
            interval,
            shutdown: CancellationToken::new(),
        });
        let worker = tokio::spawn(Inner::run(inner.clone()));
        Self { inner, worker }
    }

    /// Flip `Empty` -> `Loaded` once the backend handles are wired up.
    /// Irreversible; a no-op in any other state.
    pub fn mark_loaded(&self) {
        self.inner.state_tx.send_if_modified(|state| {
            if matches!(state, AdapterState::Empty) {
                *state = AdapterState::Loaded;
                true
            } else {
                false
            }
        });
    }

    /// Enable the periodic trigger and request an initial sync.
    pub fn start(&self) {
        self.inner.started.store(true, Ordering::SeqCst);
        self.inner.refresh.notify_one();
    }

    /// Suspend the periodic trigger. Manual [`refresh`](Self::refresh) still
    /// works while stopped.
    pub fn stop(&self) {
        self.inner.started.store(false, Ordering::SeqCst);
    }

    /// Force an immediate sync. If one is already running, at most one
    /// follow-up attempt is retained.
    pub fn refresh(&self) {
        self.inner.refresh.notify_one();
    }

    pub fn state(&self) -> AdapterState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AdapterState> {
        self.inner.state_tx.subscribe()
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        self.worker.abort();
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick completes immediately; consume it so the
        // first sync is driven by start()/refresh(), not by task spawn.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.refresh.notified() => {}
                _ = ticker.tick(), if self.started.load(Ordering::SeqCst) => {}
            }
            self.sync_once().await;
            discard_pending(&mut ticker, &self.refresh).await;
        }
    }

    async fn sync_once(&self) {
        {
            let state = self.state_tx.borrow();
            if !state.is_syncable() {
                log::debug!("sync trigger ignored in state {:?}", *state);
                return;
            }
        }

        self.set_state(AdapterState::Syncing);

        match self.fetch().await {
            Ok((balance, records)) => {
                log::debug!(
                    "sync finished: {} units, {} records",
                    balance.units,
                    records.len()
                );
                self.cache.replace(balance, records);
                self.set_state(AdapterState::Synced);
            }
            Err(e) => {
                // Last-known cache values stay visible; the error is retained
                // in the state for inspection and the next trigger re-attempts.
                log::error!("sync failed: {}", e);
                self.set_state(AdapterState::Failed(e.to_string()));
            }
        }
    }

    async fn fetch(&self) -> Result<(Balance, Vec<TransactionRecord>), BackendError> {
        self.backend.sync().await?;
        let units = self.backend.get_balance().await?;
        let mut records = self.backend.get_transactions().await?;
        sort_records(&mut records);
        Ok((Balance::new(units, self.cache.decimals()), records))
    }

    fn set_state(&self, state: AdapterState) {
        self.state_tx.send_replace(state);
    }
}

/// Discard triggers that accrued while a sync ran: an interval deadline that
/// elapsed mid-sync and any stored refresh permit are dropped, not replayed.
/// The zero timeout consumes a ready trigger and leaves a pending one alone.
async fn discard_pending(ticker: &mut tokio::time::Interval, refresh: &Notify) {
    let _ = tokio::time::timeout(Duration::ZERO, ticker.tick()).await;
    let _ = tokio::time::timeout(Duration::ZERO, refresh.notified()).await;
}
