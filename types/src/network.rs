//! Chain profile selection.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::PaywatchError;

/// Which chain/token deployment the engine watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    /// Sepolia testnet with a 6-decimal USDT test token.
    Dev,
    /// BSC mainnet with an 18-decimal stablecoin.
    Prod,
}

impl NetworkProfile {
    /// Token decimals used when the configuration does not override them.
    pub fn default_decimals(&self) -> u8 {
        match self {
            Self::Dev => 6,
            Self::Prod => 18,
        }
    }

    /// Human-readable chain name.
    pub fn chain_name(&self) -> &'static str {
        match self {
            Self::Dev => "Sepolia Testnet",
            Self::Prod => "BSC Mainnet",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl FromStr for NetworkProfile {
    type Err = PaywatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(PaywatchError::UnknownNetwork(other.to_string())),
        }
    }
}
