//! Ethereum adapter: account backend + synthetic gas-price fee tiers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::adapter::{Adapter, BalanceAdapter, DepositAdapter, TransactionsAdapter};
use crate::backend::{AccountBackend, AccountSigner, WalletBackend};
use crate::cache::AssetCache;
use crate::config::EngineConfig;
use crate::error::BackendError;
use crate::fees::FeeTierFeed;
use crate::market::MarketFeed;
use crate::send::EthereumSendPipeline;
use crate::sync::SyncCoordinator;
use crate::types::{AdapterState, Balance, FeeTierSet, TransactionRecord};

const ETH_DECIMALS: u8 = 18;
const ETH_SYMBOL: &str = "ETH";

pub struct EthereumAdapter {
    backend: Arc<dyn WalletBackend>,
    cache: Arc<AssetCache>,
    coordinator: Arc<SyncCoordinator>,
    fees: Arc<FeeTierFeed>,
    pipeline: EthereumSendPipeline,
}

impl EthereumAdapter {
    /// Build an Ethereum adapter. Without a signer the adapter is watch-only:
    /// it syncs and prices candidates but [`SendPipeline::send`] fails with
    /// `NoSigner`.
    ///
    /// [`SendPipeline::send`]: crate::send::SendPipeline::send
    pub fn new<B: AccountBackend + 'static>(
        backend: Arc<B>,
        config: &EngineConfig,
        signer: Option<Arc<dyn AccountSigner>>,
        market: Option<Arc<MarketFeed>>,
    ) -> Self {
        let cache = Arc::new(AssetCache::new(ETH_DECIMALS));
        let coordinator = Arc::new(SyncCoordinator::new(
            backend.clone() as Arc<dyn WalletBackend>,
            cache.clone(),
            config.sync_interval,
        ));
        coordinator.mark_loaded();

        let fees = Arc::new(FeeTierFeed::gas_price(
            backend.clone() as Arc<dyn AccountBackend>,
            config.fee_refresh_interval,
        ));
        let pipeline = EthereumSendPipeline::new(
            backend.clone() as Arc<dyn AccountBackend>,
            cache.clone(),
            fees.clone(),
            coordinator.clone(),
            signer,
            market,
            ETH_SYMBOL,
        );

        Self {
            backend: backend as Arc<dyn WalletBackend>,
            cache,
            coordinator,
            fees,
            pipeline,
        }
    }

    pub fn send_pipeline(&self) -> &EthereumSendPipeline {
        &self.pipeline
    }

    pub fn fee_tiers(&self) -> Option<FeeTierSet> {
        self.fees.current_tiers()
    }

    pub fn subscribe_fee_tiers(&self) -> watch::Receiver<Option<FeeTierSet>> {
        self.fees.subscribe()
    }
}

impl Adapter for EthereumAdapter {
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

impl BalanceAdapter for EthereumAdapter {
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

impl TransactionsAdapter for EthereumAdapter {
    fn transaction_records(&self) -> Arc<Vec<TransactionRecord>> {
        self.cache.current_transactions()
    }

    fn subscribe_transactions(&self) -> watch::Receiver<Arc<Vec<TransactionRecord>>> {
        self.cache.subscribe_transactions()
    }
}

#[async_trait]
impl DepositAdapter for EthereumAdapter {
    async fn receive_address(&self) -> Result<String, BackendError> {
        self.backend.get_receive_address().await
    }
}
