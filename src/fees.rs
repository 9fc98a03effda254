//! Fee tier feed: periodically fetches and caches recommended fee tiers.
//!
//! UTXO assets use an external recommended-fees endpoint; account-model
//! assets derive a synthetic tier set from the backend's current gas price.
//! Fetch failure is non-fatal: the previous value is kept and the error is
//! only logged, since a send can still use a cached tier or an explicit rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::AccountBackend;
use crate::error::FeeError;
use crate::types::FeeTierSet;

/// Payload of the recommended-fees endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedFees {
    fastest_fee: u64,
    half_hour_fee: u64,
    hour_fee: u64,
}

impl From<RecommendedFees> for FeeTierSet {
    fn from(fees: RecommendedFees) -> Self {
        FeeTierSet {
            fast: fees.fastest_fee,
            normal: fees.half_hour_fee,
            slow: fees.hour_fee,
        }
    }
}

enum TierSource {
    /// vByte-rate tiers from an external estimator.
    Http {
        url: String,
        client: reqwest::Client,
    },
    /// Synthetic tiers derived from the backend's current gas price.
    GasPrice(Arc<dyn AccountBackend>),
}

/// Cached fee tiers with a background refresh loop. `current_tiers()` is
/// `None` only until the first successful fetch.
pub struct FeeTierFeed {
    inner: Arc<FeedInner>,
    worker: JoinHandle<()>,
}

struct FeedInner {
    source: TierSource,
    tiers_tx: watch::Sender<Option<FeeTierSet>>,
    refresh: Notify,
    started: AtomicBool,
    interval: Duration,
    shutdown: CancellationToken,
}

impl FeeTierFeed {
    pub fn http(url: impl Into<String>, interval: Duration) -> Self {
        Self::with_source(
            TierSource::Http {
                url: url.into(),
                client: reqwest::Client::new(),
            },
            interval,
        )
    }

    pub fn gas_price(backend: Arc<dyn AccountBackend>, interval: Duration) -> Self {
        Self::with_source(TierSource::GasPrice(backend), interval)
    }

    fn with_source(source: TierSource, interval: Duration) -> Self {
        let (tiers_tx, _) = watch::channel(None);
        let inner = Arc::new(FeedInner {
            source,
            tiers_tx,
            refresh: Notify::new(),
            started: AtomicBool::new(false),
            interval,
            shutdown: CancellationToken::new(),
        });
        let worker = tokio::spawn(FeedInner::run(inner.clone()));
        let feed = Self { inner, worker };
        // Prime the cache so a send started right away has tiers to use.
        feed.refresh();
        feed
    }

    pub fn start(&self) {
        self.inner.started.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.inner.started.store(false, Ordering::SeqCst);
    }

    /// Request an immediate fetch.
    pub fn refresh(&self) {
        self.inner.refresh.notify_one();
    }

    /// Last successfully fetched tiers, if any.
    pub fn current_tiers(&self) -> Option<FeeTierSet> {
        *self.inner.tiers_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<FeeTierSet>> {
        self.inner.tiers_tx.subscribe()
    }
}

impl Drop for FeeTierFeed {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        self.worker.abort();
    }
}

impl FeedInner {
    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.refresh.notified() => {}
                _ = ticker.tick(), if self.started.load(Ordering::SeqCst) => {}
            }
            self.refresh_once().await;
        }
    }

    async fn refresh_once(&self) {
        match self.fetch().await {
            Ok(tiers) => {
                log::debug!("fee tiers updated: {:?}", tiers);
                self.tiers_tx.send_replace(Some(tiers));
            }
            Err(e) => {
                log::warn!("fee tier fetch failed, keeping previous value: {}", e);
            }
        }
    }

    async fn fetch(&self) -> Result<FeeTierSet, FeeError> {
        match &self.source {
            TierSource::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                let fees: RecommendedFees = serde_json::from_str(&body)?;
                Ok(fees.into())
            }
            TierSource::GasPrice(backend) => {
                let gas_price = backend.gas_price().await?;
                Ok(synthetic_gas_tiers(gas_price))
            }
        }
    }
}

/// Synthetic tier spread around the current gas price: fast pays a 25%
/// premium, slow a 25% discount (floored at 1).
fn synthetic_gas_tiers(gas_price: u64) -> FeeTierSet {
    FeeTierSet {
        fast: gas_price + gas_price / 4,
        normal: gas_price,
        slow: gas_price.saturating_sub(gas_price / 4).max(1),
    }
}
