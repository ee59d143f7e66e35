use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("conflicting state: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
