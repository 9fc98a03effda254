#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use wallet_engine::backend::{
    AccountBackend, AccountSigner, RawAccountTx, SignedUtxoTx, TransferData, TxSignature,
    UnsignedUtxoTx, UtxoBackend, WalletBackend,
};
use wallet_engine::error::BackendError;
use wallet_engine::types::{TransactionRecord, TxUserData};
use wallet_engine::EngineConfig;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config pointing at a dead fee endpoint so tier fetches fail fast and the
/// pipelines fall back to the default rate.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        bitcoin_network: bitcoin::Network::Signet,
        fee_endpoint: "http://127.0.0.1:0/fees".to_string(),
        sync_interval: Duration::from_secs(60),
        fee_refresh_interval: Duration::from_secs(60),
    }
}

/// Poll a condition under the paused test clock.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within the polling budget");
}

pub fn confirmed(txid: &str, secs: i64, amount: i128) -> TransactionRecord {
    TransactionRecord {
        txid: txid.to_string(),
        confirmed_at: Some(Utc.timestamp_opt(secs, 0).unwrap()),
        amount,
        from: None,
        to: None,
        fee: None,
        user_data: TxUserData::default(),
    }
}

pub fn unconfirmed(txid: &str, amount: i128) -> TransactionRecord {
    TransactionRecord {
        txid: txid.to_string(),
        confirmed_at: None,
        amount,
        from: None,
        to: None,
        fee: None,
        user_data: TxUserData::default(),
    }
}

/// Scripted UTXO backend. Balance, history and fee are fixtures; counters and
/// failure flags let tests observe and steer the engine's behavior.
pub struct MockUtxoBackend {
    pub balance: Mutex<u128>,
    pub transactions: Mutex<Vec<TransactionRecord>>,
    /// Flat fee returned by estimation and used by the builder.
    pub fee: AtomicU64,
    pub sync_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub fail_sync: AtomicBool,
    pub fail_broadcast: AtomicBool,
    /// When set, the next sync call blocks until the notify fires.
    pub sync_gate: Mutex<Option<Arc<Notify>>>,
    /// Artificial latency for fee estimation, for staleness tests.
    pub estimate_delay_ms: AtomicU64,
    broadcast_count: AtomicUsize,
}

impl MockUtxoBackend {
    pub fn new(balance: u128) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance),
            transactions: Mutex::new(Vec::new()),
            fee: AtomicU64::new(300),
            sync_calls: AtomicUsize::new(0),
            estimate_calls: AtomicUsize::new(0),
            fail_sync: AtomicBool::new(false),
            fail_broadcast: AtomicBool::new(false),
            sync_gate: Mutex::new(None),
            estimate_delay_ms: AtomicU64::new(0),
            broadcast_count: AtomicUsize::new(0),
        })
    }

    pub fn set_transactions(&self, records: Vec<TransactionRecord>) {
        *self.transactions.lock().unwrap() = records;
    }

    pub fn gate_next_sync(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.sync_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl WalletBackend for MockUtxoBackend {
    async fn sync(&self) -> Result<(), BackendError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.sync_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(BackendError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    async fn get_balance(&self) -> Result<u128, BackendError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_transactions(&self) -> Result<Vec<TransactionRecord>, BackendError> {
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn get_receive_address(&self) -> Result<String, BackendError> {
        Ok("tb1qmockreceiveaddress".to_string())
    }
}

#[async_trait]
impl UtxoBackend for MockUtxoBackend {
    async fn estimate_fee(
        &self,
        _recipient: &str,
        _amount_sats: u64,
        _fee_rate: u64,
    ) -> Result<u64, BackendError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.estimate_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(self.fee.load(Ordering::SeqCst))
    }

    async fn build_transaction(
        &self,
        recipient: &str,
        amount_sats: u64,
        _fee_rate: u64,
        drain: bool,
    ) -> Result<UnsignedUtxoTx, BackendError> {
        let fee = self.fee.load(Ordering::SeqCst);
        let amount = if drain {
            (*self.balance.lock().unwrap() as u64).saturating_sub(fee)
        } else {
            amount_sats
        };
        Ok(UnsignedUtxoTx {
            recipient: recipient.to_string(),
            amount_sats: amount,
            fee_sats: fee,
            drain,
        })
    }

    async fn sign(&self, _tx: UnsignedUtxoTx) -> Result<SignedUtxoTx, BackendError> {
        Ok(SignedUtxoTx { raw: vec![0; 64] })
    }

    async fn broadcast(&self, _tx: SignedUtxoTx) -> Result<String, BackendError> {
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(BackendError::Backend("mempool rejected".to_string()));
        }
        let n = self.broadcast_count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("tx-{}", n))
    }
}

/// Scripted account-model backend with fixed gas parameters.
pub struct MockAccountBackend {
    pub balance: Mutex<u128>,
    pub transactions: Mutex<Vec<TransactionRecord>>,
    pub gas_estimate: AtomicU64,
    pub gas_price_value: AtomicU64,
    pub sync_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub fail_broadcast: AtomicBool,
    pub fail_gas_price: AtomicBool,
    broadcast_count: AtomicUsize,
}

impl MockAccountBackend {
    pub fn new(balance: u128) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance),
            transactions: Mutex::new(Vec::new()),
            gas_estimate: AtomicU64::new(21_000),
            gas_price_value: AtomicU64::new(10),
            sync_calls: AtomicUsize::new(0),
            estimate_calls: AtomicUsize::new(0),
            fail_broadcast: AtomicBool::new(false),
            fail_gas_price: AtomicBool::new(false),
            broadcast_count: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WalletBackend for MockAccountBackend {
    async fn sync(&self) -> Result<(), BackendError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_balance(&self) -> Result<u128, BackendError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_transactions(&self) -> Result<Vec<TransactionRecord>, BackendError> {
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn get_receive_address(&self) -> Result<String, BackendError> {
        Ok("0x00000000219ab540356cbb839cbe05303d7705fa".to_string())
    }
}

#[async_trait]
impl AccountBackend for MockAccountBackend {
    async fn gas_price(&self) -> Result<u64, BackendError> {
        if self.fail_gas_price.load(Ordering::SeqCst) {
            return Err(BackendError::Network("rpc unavailable".to_string()));
        }
        Ok(self.gas_price_value.load(Ordering::SeqCst))
    }

    async fn estimate_gas_limit(
        &self,
        _to: &str,
        _value: u128,
        _gas_price: u64,
    ) -> Result<u64, BackendError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    fn transfer_data(&self, to: &str, value: u128) -> TransferData {
        TransferData {
            to: to.to_string(),
            value,
            input: Vec::new(),
        }
    }

    async fn raw_transaction(
        &self,
        data: TransferData,
        gas_price: u64,
        gas_limit: u64,
    ) -> Result<RawAccountTx, BackendError> {
        Ok(RawAccountTx {
            data,
            gas_price,
            gas_limit,
        })
    }

    async fn broadcast(
        &self,
        _tx: RawAccountTx,
        _signature: TxSignature,
    ) -> Result<String, BackendError> {
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(BackendError::Backend("nonce too low".to_string()));
        }
        let n = self.broadcast_count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0xhash{}", n))
    }
}

pub struct MockSigner;

impl AccountSigner for MockSigner {
    fn signature(&self, _tx: &RawAccountTx) -> Result<TxSignature, BackendError> {
        Ok(TxSignature(vec![1, 2, 3]))
    }
}
