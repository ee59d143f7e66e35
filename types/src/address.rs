//! EVM-style account address (`0x` followed by 40 hex digits).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::PaywatchError;

/// A leasable chain account address.
///
/// Stored in lowercase so that the same account entered with different
/// checksum casing maps to one pool row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainAddress(String);

impl ChainAddress {
    /// Number of hex digits after the `0x` prefix.
    pub const HEX_LEN: usize = 40;

    /// Parse and normalise an address string.
    pub fn parse(raw: &str) -> Result<Self, PaywatchError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| PaywatchError::InvalidAddress(raw.to_string()))?;
        if body.len() != Self::HEX_LEN || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PaywatchError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Return the normalised address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 40 hex digits without the `0x` prefix.
    pub fn hex_body(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainAddress {
    type Err = PaywatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
