use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC transport failed: {0}")]
    Transport(String),

    #[error("RPC endpoint is rate limiting requests")]
    RateLimited,

    #[error("RPC endpoint returned HTTP {0}")]
    Http(u16),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed RPC response: {0}")]
    Malformed(String),
}

impl ChainError {
    /// Whether retrying the same call later can reasonably succeed.
    ///
    /// A malformed response usually means a misconfigured endpoint or token
    /// contract; it is still retried by the watcher but logged louder.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }
}
