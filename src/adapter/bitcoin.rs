//! Bitcoin adapter: UTXO backend + HTTP fee tier feed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::adapter::{Adapter, BalanceAdapter, DepositAdapter, TransactionsAdapter};
use crate::backend::{UtxoBackend, WalletBackend};
use crate::cache::AssetCache;
use crate::config::EngineConfig;
use crate::error::BackendError;
use crate::fees::FeeTierFeed;
use crate::market::MarketFeed;
use crate::send::BitcoinSendPipeline;
use crate::sync::SyncCoordinator;
use crate::types::{AdapterState, Balance, FeeTierSet, TransactionRecord};

const BTC_DECIMALS: u8 = 8;
const BTC_SYMBOL: &str = "BTC";

pub struct BitcoinAdapter {
    backend: Arc<dyn WalletBackend>,
    cache: Arc<AssetCache>,
    coordinator: Arc<SyncCoordinator>,
    fees: Arc<FeeTierFeed>,
    pipeline: BitcoinSendPipeline,
}

impl BitcoinAdapter {
    pub fn new<B: UtxoBackend + 'static>(
        backend: Arc<B>,
        config: &EngineConfig,
        market: Option<Arc<MarketFeed>>,
    ) -> Self {
        let cache = Arc::new(AssetCache::new(BTC_DECIMALS));
        let coordinator = Arc::new(SyncCoordinator::new(
            backend.clone() as Arc<dyn WalletBackend>,
            cache.clone(),
            config.sync_interval,
        ));
        coordinator.mark_loaded();

        let fees = Arc::new(FeeTierFeed::http(
            config.fee_endpoint.clone(),
            config.fee_refresh_interval,
        ));
        let pipeline = BitcoinSendPipeline::new(
            backend.clone() as Arc<dyn UtxoBackend>,
            cache.clone(),
            fees.clone(),
            coordinator.clone(),
            market,
            config.bitcoin_network,
            BTC_SYMBOL,
        );

        Self {
            backend: backend as Arc<dyn WalletBackend>,
            cache,
            coordinator,
            fees,
            pipeline,
        }
    }

    pub fn send_pipeline(&self) -> &BitcoinSendPipeline {
        &self.pipeline
    }

    pub fn fee_tiers(&self) -> Option<FeeTierSet> {
        self.fees.current_tiers()
    }

    pub fn subscribe_fee_tiers(&self) -> watch::Receiver<Option<FeeTierSet>> {
        self.fees.subscribe()
    }
}

impl Adapter for BitcoinAdapter {
    fn start(&self) {
        self.coordinator.start();
        self.fees.start();
    }

    fn stop(&self) {
        self.coordinator.stop();
        self.fees.stop();
    }

    fn refresh(&self) {
        self.coordinator.refresh();
        self.fees.refresh();
    }
}

impl BalanceAdapter for BitcoinAdapter {
    fn state(&self) -> AdapterState {
        self.coordinator.state()
    }

    fn balance(&self) -> Balance {
        self.cache.current_balance()
    }

    fn subscribe_state(&self) -> watch::Receiver<AdapterState> {
        self.coordinator.subscribe_state()
    }

    fn subscribe_balance(&self) -> watch::Receiver<Balance> {
        self.cache.subscribe_balance()
    }
}

impl TransactionsAdapter for BitcoinAdapter {
    fn transaction_records(&self) -> Arc<Vec<TransactionRecord>> {
        self.cache.current_transactions()
    }

    fn subscribe_transactions(&self) -> watch::Receiver<Arc<Vec<TransactionRecord>>> {
        self.cache.subscribe_transactions()
    }
}

#[async_trait]
impl DepositAdapter for BitcoinAdapter {
    async fn receive_address(&self) -> Result<String, BackendError> {
        self.backend.get_receive_address().await
    }
}
