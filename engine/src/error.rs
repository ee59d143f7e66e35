use thiserror::Error;

use paywatch_types::{OfferId, PaywatchError, ServiceId};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The pool is exhausted or the buyer already has a pending payment.
    #[error("no free resource: {0}")]
    NoFreeResource(String),

    /// The baseline balance could not be read; the leased address was released.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The offer does not exist, or the buyer has no such waiting service.
    #[error("not found: {0}")]
    NotFound(String),

    /// A balance poll failed. Watchers retry these on the next tick.
    #[error("transient upstream error: {0}")]
    TransientUpstreamError(String),

    /// The persistent store could not be opened. Fatal at startup.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] paywatch_store::StoreError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn service_not_found(id: ServiceId) -> Self {
        Self::NotFound(format!("waiting service {id} for this buyer"))
    }

    pub(crate) fn offer_not_found(id: OfferId) -> Self {
        Self::NotFound(id.to_string())
    }
}

impl From<PaywatchError> for EngineError {
    fn from(err: PaywatchError) -> Self {
        match err {
            PaywatchError::InvalidAmount { .. } => Self::InvalidAmount(err.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}
