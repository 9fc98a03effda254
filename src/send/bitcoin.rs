//! UTXO-model send pipeline.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::UtxoBackend;
use crate::cache::AssetCache;
use crate::error::SendError;
use crate::fees::FeeTierFeed;
use crate::market::MarketFeed;
use crate::send::{
    next_inputs, FeeSelection, PipelineState, SendInputs, SendPipeline, TransactionCandidate,
};
use crate::sync::SyncCoordinator;
use crate::types::TransactionRecord;

/// Fallback sat/vByte rate used while the tier feed has no data yet.
const DEFAULT_FEE_RATE: u64 = 1;

pub struct BitcoinSendPipeline {
    backend: Arc<dyn UtxoBackend>,
    cache: Arc<AssetCache>,
    fees: Arc<FeeTierFeed>,
    coordinator: Arc<SyncCoordinator>,
    market: Option<Arc<MarketFeed>>,
    network: bitcoin::Network,
    symbol: &'static str,
    state: Arc<PipelineState>,
    worker: JoinHandle<()>,
}

impl BitcoinSendPipeline {
    pub fn new(
        backend: Arc<dyn UtxoBackend>,
        cache: Arc<AssetCache>,
        fees: Arc<FeeTierFeed>,
        coordinator: Arc<SyncCoordinator>,
        market: Option<Arc<MarketFeed>>,
        network: bitcoin::Network,
        symbol: &'static str,
    ) -> Self {
        let state = Arc::new(PipelineState::new());
        // Subscribe before spawning so no edit can slip past the worker.
        let inputs_rx = state.subscribe_inputs();
        let worker = tokio::spawn(recompute_loop(
            backend.clone(),
            cache.clone(),
            fees.clone(),
            state.clone(),
            inputs_rx,
        ));
        Self {
            backend,
            cache,
            fees,
            coordinator,
            market,
            network,
            symbol,
            state,
            worker,
        }
    }

    fn resolve_fee_rate(&self, selection: FeeSelection) -> u64 {
        resolve_fee_rate(&self.fees, selection)
    }

    fn price(&self) -> Option<bigdecimal::BigDecimal> {
        self.market.as_ref().and_then(|m| m.price(self.symbol))
    }

    /// Snapshot the inputs and candidate for a send, verifying the candidate
    /// is current and affordable.
    fn ready_candidate(&self) -> Result<(SendInputs, TransactionCandidate), SendError> {
        let inputs = self.state.snapshot();
        self.validate_address(&inputs.recipient)?;
        let candidate = self.state.candidate().ok_or(SendError::NotReady)?;
        if candidate.generation != inputs.generation {
            return Err(SendError::NotReady);
        }
        if !candidate.valid {
            return Err(SendError::InsufficientAmount);
        }
        Ok((inputs, candidate))
    }

    /// Record the broadcast locally, then schedule a resync to reconcile with
    /// the backend's view.
    fn record_broadcast(&self, txid: String, recipient: &str, amount: u128, fee: u128) -> TransactionRecord {
        let record = TransactionRecord::unconfirmed_sent(&txid, recipient, amount, fee, self.price());
        self.cache.insert_unconfirmed(record.clone());
        self.coordinator.refresh();
        record
    }
}

impl Drop for BitcoinSendPipeline {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[async_trait]
impl SendPipeline for BitcoinSendPipeline {
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
        let parsed = bitcoin::Address::from_str(address)
            .map_err(|e| SendError::InvalidAddress(e.to_string()))?;
        parsed
            .require_network(self.network)
            .map_err(|e| SendError::InvalidAddress(e.to_string()))?;
        Ok(())
    }

    async fn send(&self) -> Result<TransactionRecord, SendError> {
        let (inputs, candidate) = self.ready_candidate()?;
        let rate = self.resolve_fee_rate(inputs.fee_selection);
        let amount_sats = sats(inputs.amount).ok_or(SendError::InsufficientAmount)?;

        let unsigned = self
            .backend
            .build_transaction(&inputs.recipient, amount_sats, rate, false)
            .await?;
        let fee = unsigned.fee_sats as u128;
        let signed = self.backend.sign(unsigned).await?;
        let txid = self
            .backend
            .broadcast(signed)
            .await
            .map_err(|e| SendError::Broadcast(e.to_string()))?;

        log::info!("broadcast {} ({} sats to {})", txid, candidate.amount, inputs.recipient);
        Ok(self.record_broadcast(txid, &inputs.recipient, candidate.amount, fee))
    }

    async fn send_max(&self) -> Result<TransactionRecord, SendError> {
        let inputs = self.state.snapshot();
        self.validate_address(&inputs.recipient)?;
        let rate = self.resolve_fee_rate(inputs.fee_selection);
        let spendable = self.spendable_balance();

        // The drain hint is advisory; the builder spends what the wallet has.
        let hint = sats(spendable).unwrap_or(u64::MAX);
        let unsigned = self
            .backend
            .build_transaction(&inputs.recipient, hint, rate, true)
            .await?;
        // The builder decides the drained amount; the hint above is advisory.
        let amount = unsigned.amount_sats as u128;
        let fee = unsigned.fee_sats as u128;
        let signed = self.backend.sign(unsigned).await?;
        let txid = self
            .backend
            .broadcast(signed)
            .await
            .map_err(|e| SendError::Broadcast(e.to_string()))?;

        log::info!("broadcast drain {} ({} sats to {})", txid, amount, inputs.recipient);
        Ok(self.record_broadcast(txid, &inputs.recipient, amount, fee))
    }
}

/// Amounts beyond the sat range can never be affordable on a UTXO chain.
fn sats(amount: u128) -> Option<u64> {
    u64::try_from(amount).ok()
}

fn resolve_fee_rate(fees: &FeeTierFeed, selection: FeeSelection) -> u64 {
    match selection {
        FeeSelection::Rate(rate) => rate,
        FeeSelection::Tier(tier) => fees
            .current_tiers()
            .map(|tiers| tiers.rate(tier))
            .unwrap_or(DEFAULT_FEE_RATE),
    }
}

async fn recompute_loop(
    backend: Arc<dyn UtxoBackend>,
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
    backend: &Arc<dyn UtxoBackend>,
    cache: &Arc<AssetCache>,
    fees: &Arc<FeeTierFeed>,
    state: &Arc<PipelineState>,
    inputs: SendInputs,
) {
    if inputs.recipient.is_empty() || inputs.amount == 0 {
        state.clear(inputs.generation);
        return;
    }
    let Some(amount_sats) = sats(inputs.amount) else {
        state.clear(inputs.generation);
        return;
    };

    let rate = resolve_fee_rate(fees, inputs.fee_selection);
    let fee = match backend
        .estimate_fee(&inputs.recipient, amount_sats, rate)
        .await
    {
        Ok(fee) => fee as u128,
        Err(e) => {
            log::debug!("fee estimation failed: {}", e);
            state.clear(inputs.generation);
            return;
        }
    };

    let balance = cache.current_balance().units;
    let total_cost = inputs.amount + fee;
    state.publish(TransactionCandidate {
        recipient: inputs.recipient,
        amount: inputs.amount,
        fee,
        total_cost,
        valid: total_cost <= balance,
        gas: None,
        generation: inputs.generation,
    });
}
