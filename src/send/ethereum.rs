//! Account-model send pipeline.
//!
//! Account-model sends are priced as `gas_limit * gas_price`. The gas limit
//! estimate gets a safety surcharge so a transaction is not underpriced when
//! execution costs drift between estimation and inclusion. A sweep (send the
//! whole balance) needs two passes: the fee cannot be known without an
//! estimate, and the estimate needs a value that the balance can still cover.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::{AccountBackend, AccountSigner};
use crate::cache::AssetCache;
use crate::error::SendError;
use crate::fees::FeeTierFeed;
use crate::market::MarketFeed;
use crate::send::{
    next_inputs, FeeSelection, GasData, PipelineState, SendInputs, SendPipeline,
    TransactionCandidate,
};
use crate::sync::SyncCoordinator;
use crate::types::TransactionRecord;

/// Safety margin applied to the backend's gas limit estimate.
const GAS_LIMIT_SURCHARGE_PERCENT: u64 = 5;

fn surcharged(gas_limit: u64) -> u64 {
    gas_limit + gas_limit * GAS_LIMIT_SURCHARGE_PERCENT / 100
}

pub struct EthereumSendPipeline {
    backend: Arc<dyn AccountBackend>,
    cache: Arc<AssetCache>,
    coordinator: Arc<SyncCoordinator>,
    signer: Option<Arc<dyn AccountSigner>>,
    market: Option<Arc<MarketFeed>>,
    symbol: &'static str,
    state: Arc<PipelineState>,
    worker: JoinHandle<()>,
}

impl EthereumSendPipeline {
    pub fn new(
        backend: Arc<dyn AccountBackend>,
        cache: Arc<AssetCache>,
        fees: Arc<FeeTierFeed>,
        coordinator: Arc<SyncCoordinator>,
        signer: Option<Arc<dyn AccountSigner>>,
        market: Option<Arc<MarketFeed>>,
        symbol: &'static str,
    ) -> Self {
        let state = Arc::new(PipelineState::new());
        let inputs_rx = state.subscribe_inputs();
        let worker = tokio::spawn(recompute_loop(
            backend.clone(),
            cache.clone(),
            fees,
            state.clone(),
            inputs_rx,
        ));
        Self {
            backend,
            cache,
            coordinator,
            signer,
            market,
            symbol,
            state,
            worker,
        }
    }

    fn price(&self) -> Option<bigdecimal::BigDecimal> {
        self.market.as_ref().and_then(|m| m.price(self.symbol))
    }
}

impl Drop for EthereumSendPipeline {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[async_trait]
impl SendPipeline for EthereumSendPipeline {
    fn set_amount(&self, amount: u128) {
        self.state.edit(|i| i.amount = amount);
    }

    fn set_recipient(&self, recipient: &str) {
        self.state.edit(|i| i.recipient = recipient.to_string());
    }

    fn set_fee_selection(&self, selection: FeeSelection) {
        self.state.edit(|i| i.fee_selection = selection);
    }

    fn candidate(&self) -> Option<TransactionCandidate> {
        self.state.candidate()
    }

    fn subscribe_candidate(&self) -> watch::Receiver<Option<TransactionCandidate>> {
        self.state.subscribe_candidate()
    }

    fn spendable_balance(&self) -> u128 {
        let balance = self.cache.current_balance().units;
        match self.state.candidate() {
            Some(candidate) => balance.saturating_sub(candidate.fee),
            None => balance,
        }
    }

    fn validate_address(&self, address: &str) -> Result<(), SendError> {
        validate_eth_address(address)
    }

    async fn send(&self) -> Result<TransactionRecord, SendError> {
        let inputs = self.state.snapshot();
        self.validate_address(&inputs.recipient)?;
        let candidate = self.state.candidate().ok_or(SendError::NotReady)?;
        if candidate.generation != inputs.generation {
            return Err(SendError::NotReady);
        }
        if !candidate.valid {
            return Err(SendError::InsufficientAmount);
        }
        let signer = self.signer.as_ref().ok_or(SendError::NoSigner)?;
        let gas = candidate.gas.ok_or(SendError::NotReady)?;

        let data = self
            .backend
            .transfer_data(&candidate.recipient, candidate.amount);
        let tx = self
            .backend
            .raw_transaction(data, gas.gas_price, gas.gas_limit)
            .await?;
        let signature = signer.signature(&tx)?;
        let txid = self
            .backend
            .broadcast(tx, signature)
            .await
            .map_err(|e| SendError::Broadcast(e.to_string()))?;

        log::info!(
            "broadcast {} ({} wei to {})",
            txid,
            candidate.amount,
            candidate.recipient
        );
        let record = TransactionRecord::unconfirmed_sent(
            &txid,
            &candidate.recipient,
            candidate.amount,
            candidate.fee,
            self.price(),
        );
        self.cache.insert_unconfirmed(record.clone());
        self.coordinator.refresh();
        Ok(record)
    }

    /// A sweep candidate is already computed as `balance - fee` by the
    /// recompute loop once the amount equals the balance, so a max send is
    /// just a send of the current candidate.
    async fn send_max(&self) -> Result<TransactionRecord, SendError> {
        self.send().await
    }
}

/// Hex account address with `0x` prefix and a 20-byte body.
pub(crate) fn validate_eth_address(address: &str) -> Result<(), SendError> {
    let body = address
        .strip_prefix("0x")
        .ok_or_else(|| SendError::InvalidAddress("missing 0x prefix".to_string()))?;
    let bytes =
        hex::decode(body).map_err(|e| SendError::InvalidAddress(e.to_string()))?;
    if bytes.len() != 20 {
        return Err(SendError::InvalidAddress(format!(
            "expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

async fn recompute_loop(
    backend: Arc<dyn AccountBackend>,
    cache: Arc<AssetCache>,
    fees: Arc<FeeTierFeed>,
    state: Arc<PipelineState>,
    mut inputs_rx: watch::Receiver<SendInputs>,
) {
    while let Some(inputs) = next_inputs(&mut inputs_rx).await {
        recompute(&backend, &cache, &fees, &state, inputs).await;
    }
}

async fn recompute(
    backend: &Arc<dyn AccountBackend>,
    cache: &Arc<AssetCache>,
    fees: &Arc<FeeTierFeed>,
    state: &Arc<PipelineState>,
    inputs: SendInputs,
) {
    if inputs.amount == 0 || validate_eth_address(&inputs.recipient).is_err() {
        state.clear(inputs.generation);
        return;
    }

    let gas_price = match inputs.fee_selection {
        FeeSelection::Rate(rate) => rate,
        FeeSelection::Tier(tier) => match fees.current_tiers() {
            Some(tiers) => tiers.rate(tier),
            None => match backend.gas_price().await {
                Ok(price) => price,
                Err(e) => {
                    log::debug!("gas price fetch failed: {}", e);
                    state.clear(inputs.generation);
                    return;
                }
            },
        },
    };

    let balance = cache.current_balance().units;
    let mut value = inputs.amount;

    // Sweep: estimate with a placeholder value first, then shrink the real
    // value by the resulting fee so the estimate call itself can succeed.
    if value == balance && value > 0 {
        match backend.estimate_gas_limit(&inputs.recipient, 1, gas_price).await {
            Ok(limit) => {
                let fee = GasData {
                    estimated_gas_limit: limit,
                    gas_limit: surcharged(limit),
                    gas_price,
                }
                .fee();
                value = value.saturating_sub(fee);
            }
            Err(e) => {
                log::debug!("sweep gas estimation failed: {}", e);
                state.clear(inputs.generation);
                return;
            }
        }
    }

    let gas = match backend
        .estimate_gas_limit(&inputs.recipient, value, gas_price)
        .await
    {
        Ok(limit) => GasData {
            estimated_gas_limit: limit,
            gas_limit: surcharged(limit),
            gas_price,
        },
        Err(e) => {
            log::debug!("gas estimation failed: {}", e);
            state.clear(inputs.generation);
            return;
        }
    };

    let fee = gas.fee();
    let total_cost = value + fee;
    state.publish(TransactionCandidate {
        recipient: inputs.recipient,
        amount: value,
        fee,
        total_cost,
        valid: total_cost <= balance && value > 0,
        gas: Some(gas),
        generation: inputs.generation,
    });
}
