//! Reactive send pipelines.
//!
//! A pipeline holds the user's draft send inputs (amount, recipient, fee
//! selection) and recomputes a [`TransactionCandidate`] in a background
//! worker whenever any input changes. Edits are debounced; a recompute that
//! finishes after further edits is discarded via a generation counter so the
//! published candidate always matches the latest inputs.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::SendError;
use crate::types::{FeeTier, TransactionRecord};

pub mod bitcoin;
pub mod ethereum;

pub use self::bitcoin::BitcoinSendPipeline;
pub use self::ethereum::EthereumSendPipeline;

/// How long to let input edits settle before recomputing the candidate.
pub(crate) const RECOMPUTE_DEBOUNCE: Duration = Duration::from_millis(50);

/// Fee choice for a draft send: a named tier resolved against the current
/// tier set, or an explicit rate (sat/vByte or gas price).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSelection {
    Tier(FeeTier),
    Rate(u64),
}

/// Draft send inputs as last edited by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SendInputs {
    pub amount: u128,
    pub recipient: String,
    pub fee_selection: FeeSelection,
    /// Bumped on every edit; candidates carry the generation they were
    /// computed from so stale results can be discarded.
    pub generation: u64,
}

impl Default for SendInputs {
    fn default() -> Self {
        Self {
            amount: 0,
            recipient: String::new(),
            fee_selection: FeeSelection::Tier(FeeTier::Normal),
            generation: 0,
        }
    }
}

/// Resolved gas parameters of an account-model candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasData {
    /// Backend's raw gas estimate.
    pub estimated_gas_limit: u64,
    /// Estimate with the safety surcharge applied; used for the fee.
    pub gas_limit: u64,
    pub gas_price: u64,
}

impl GasData {
    pub fn fee(&self) -> u128 {
        self.gas_limit as u128 * self.gas_price as u128
    }
}

/// A fully priced draft transaction, recomputed from the latest inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionCandidate {
    pub recipient: String,
    pub amount: u128,
    pub fee: u128,
    /// Amount plus fee.
    pub total_cost: u128,
    /// Whether the wallet can afford this candidate.
    pub valid: bool,
    /// Present for account-model candidates only.
    pub gas: Option<GasData>,
    pub(crate) generation: u64,
}

/// Asset-family-agnostic surface of a send pipeline.
#[async_trait]
pub trait SendPipeline: Send + Sync {
    fn set_amount(&self, amount: u128);

    fn set_recipient(&self, recipient: &str);

    fn set_fee_selection(&self, selection: FeeSelection);

    /// Latest published candidate, if the current inputs produced one.
    fn candidate(&self) -> Option<TransactionCandidate>;

    fn subscribe_candidate(&self) -> watch::Receiver<Option<TransactionCandidate>>;

    /// Fee of the current candidate, if any.
    fn fee(&self) -> Option<u128> {
        self.candidate().map(|c| c.fee)
    }

    /// Maximum amount the current balance can cover after the candidate's fee.
    fn spendable_balance(&self) -> u128;

    fn candidate_valid(&self) -> bool {
        self.candidate().map(|c| c.valid).unwrap_or(false)
    }

    fn validate_address(&self, address: &str) -> Result<(), SendError>;

    /// Build, sign and broadcast the current candidate. Returns the synthetic
    /// unconfirmed record inserted into the cache.
    async fn send(&self) -> Result<TransactionRecord, SendError>;

    /// Drain the wallet to the current recipient.
    async fn send_max(&self) -> Result<TransactionRecord, SendError>;
}

/// Shared input/candidate plumbing used by both pipeline families.
pub(crate) struct PipelineState {
    inputs_tx: watch::Sender<SendInputs>,
    candidate_tx: watch::Sender<Option<TransactionCandidate>>,
}

impl PipelineState {
    pub fn new() -> Self {
        let (inputs_tx, _) = watch::channel(SendInputs::default());
        let (candidate_tx, _) = watch::channel(None);
        Self {
            inputs_tx,
            candidate_tx,
        }
    }

    /// Apply an edit and bump the generation so in-flight recomputes become
    /// stale.
    pub fn edit(&self, f: impl FnOnce(&mut SendInputs)) {
        self.inputs_tx.send_modify(|inputs| {
            f(inputs);
            inputs.generation += 1;
        });
    }

    pub fn snapshot(&self) -> SendInputs {
        self.inputs_tx.borrow().clone()
    }

    pub fn subscribe_inputs(&self) -> watch::Receiver<SendInputs> {
        self.inputs_tx.subscribe()
    }

    pub fn candidate(&self) -> Option<TransactionCandidate> {
        self.candidate_tx.borrow().clone()
    }

    pub fn subscribe_candidate(&self) -> watch::Receiver<Option<TransactionCandidate>> {
        self.candidate_tx.subscribe()
    }

    /// Publish a candidate unless the inputs moved on while it was computed.
    pub fn publish(&self, candidate: TransactionCandidate) {
        if candidate.generation != self.inputs_tx.borrow().generation {
            log::debug!("discarding stale candidate for {}", candidate.recipient);
            return;
        }
        self.candidate_tx.send_replace(Some(candidate));
    }

    /// Clear the candidate for the given generation (inputs incomplete or
    /// estimation failed). Stale clears are dropped like stale publishes.
    pub fn clear(&self, generation: u64) {
        if generation != self.inputs_tx.borrow().generation {
            return;
        }
        self.candidate_tx.send_replace(None);
    }
}

/// Wait for the next inputs change, then drain the debounce window so a burst
/// of edits triggers a single recompute of the final value.
pub(crate) async fn next_inputs(rx: &mut watch::Receiver<SendInputs>) -> Option<SendInputs> {
    if rx.changed().await.is_err() {
        return None;
    }
    loop {
        match tokio::time::timeout(RECOMPUTE_DEBOUNCE, rx.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) => return None,
            Err(_) => break,
        }
    }
    Some(rx.borrow_and_update().clone())
}
