use thiserror::Error;

/// Errors surfaced by an injected chain backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
}

/// Adapter-level failures. Sync failures are absorbed into
/// [`crate::types::AdapterState::Failed`] and logged; they are never thrown
/// at the consumer.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Backend or local persistence unreachable at construction. Fatal to the
    /// adapter.
    #[error("adapter initialization failed: {0}")]
    Initialization(String),

    #[error("sync failed: {0}")]
    Sync(#[from] BackendError),
}

/// Errors returned synchronously from the send pipeline. Validation and
/// broadcast failures are always the direct result of the triggering call;
/// none of them mutate the cache.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("amount exceeds spendable balance")]
    InsufficientAmount,

    #[error("no signing capability configured")]
    NoSigner,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No candidate has been derived from the current inputs yet.
    #[error("transaction candidate is not ready")]
    NotReady,

    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Fee tier fetch failures. Non-fatal: the previous tier set is kept.
#[derive(Error, Debug)]
pub enum FeeError {
    #[error("fee endpoint request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("fee endpoint returned malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
