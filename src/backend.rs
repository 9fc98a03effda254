//! Injected chain-backend capability sets.
//!
//! The engine never talks to a chain library directly; each asset adapter is
//! constructed with an object implementing one of these traits. The engine
//! treats them as capability providers: sync, read balance/history, build,
//! sign and broadcast transactions.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::TransactionRecord;

/// Capabilities every chain backend provides regardless of ledger model.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Bring the backend's local view up to date with the remote ledger.
    async fn sync(&self) -> Result<(), BackendError>;

    /// Current balance in the asset's smallest unit.
    async fn get_balance(&self) -> Result<u128, BackendError>;

    /// Full transaction history as the backend knows it. Ordering is up to
    /// the caller.
    async fn get_transactions(&self) -> Result<Vec<TransactionRecord>, BackendError>;

    async fn get_receive_address(&self) -> Result<String, BackendError>;
}

/// An unsigned UTXO-chain transaction produced by the backend's builder.
#[derive(Debug, Clone)]
pub struct UnsignedUtxoTx {
    pub recipient: String,
    pub amount_sats: u64,
    pub fee_sats: u64,
    /// True when the builder was asked to drain the wallet (send-max).
    pub drain: bool,
}

/// A signed, broadcast-ready UTXO-chain transaction.
#[derive(Debug, Clone)]
pub struct SignedUtxoTx {
    pub raw: Vec<u8>,
}

/// Capability set for UTXO-model chains (e.g. Bitcoin).
#[async_trait]
pub trait UtxoBackend: WalletBackend {
    /// Estimate the fee for a still-unsigned transaction built from the given
    /// inputs at the given sat/vByte rate.
    async fn estimate_fee(
        &self,
        recipient: &str,
        amount_sats: u64,
        fee_rate: u64,
    ) -> Result<u64, BackendError>;

    /// Build an unsigned transaction. With `drain` set the builder spends the
    /// whole wallet balance minus fee and `amount_sats` is only a hint.
    async fn build_transaction(
        &self,
        recipient: &str,
        amount_sats: u64,
        fee_rate: u64,
        drain: bool,
    ) -> Result<UnsignedUtxoTx, BackendError>;

    async fn sign(&self, tx: UnsignedUtxoTx) -> Result<SignedUtxoTx, BackendError>;

    /// Broadcast and return the transaction id.
    async fn broadcast(&self, tx: SignedUtxoTx) -> Result<String, BackendError>;
}

/// Calldata for an account-model value transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferData {
    pub to: String,
    pub value: u128,
    pub input: Vec<u8>,
}

/// An unsigned account-model transaction with resolved gas parameters.
#[derive(Debug, Clone)]
pub struct RawAccountTx {
    pub data: TransferData,
    pub gas_price: u64,
    pub gas_limit: u64,
}

#[derive(Debug, Clone)]
pub struct TxSignature(pub Vec<u8>);

/// Capability set for account-model chains (e.g. Ethereum).
#[async_trait]
pub trait AccountBackend: WalletBackend {
    /// Current network gas price, used to derive synthetic fee tiers.
    async fn gas_price(&self) -> Result<u64, BackendError>;

    async fn estimate_gas_limit(
        &self,
        to: &str,
        value: u128,
        gas_price: u64,
    ) -> Result<u64, BackendError>;

    fn transfer_data(&self, to: &str, value: u128) -> TransferData;

    /// Assemble a raw transaction (nonce resolution etc. happens here).
    async fn raw_transaction(
        &self,
        data: TransferData,
        gas_price: u64,
        gas_limit: u64,
    ) -> Result<RawAccountTx, BackendError>;

    async fn broadcast(
        &self,
        tx: RawAccountTx,
        signature: TxSignature,
    ) -> Result<String, BackendError>;
}

/// Injected signing capability for account-model chains. An adapter built
/// without one can watch but not spend.
pub trait AccountSigner: Send + Sync {
    fn signature(&self, tx: &RawAccountTx) -> Result<TxSignature, BackendError>;
}
