//! Top-level error type shared across crates.

use thiserror::Error;

/// Parsing and validation errors for the shared value types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaywatchError {
    #[error("invalid chain address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("unknown network profile: {0}")]
    UnknownNetwork(String),
}
