//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use paywatch_types::amount::MAX_DECIMALS;
use paywatch_types::{ChainAddress, NetworkProfile};
use paywatch_utils::LogFormat;

use crate::EngineError;

/// Configuration for a paywatch engine.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which chain deployment to watch.
    #[serde(default = "default_network")]
    pub network: NetworkProfile,

    /// JSON-RPC endpoint. Falls back to a public endpoint for the network.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// ERC-20 token contract whose balances are watched.
    #[serde(default)]
    pub token_contract: Option<String>,

    /// Token symbol used in buyer-facing messages.
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    /// Overrides the network's default token decimals.
    #[serde(default)]
    pub decimals: Option<u8>,

    /// How long a buyer has to pay, in seconds.
    #[serde(default = "default_payment_window_secs")]
    pub payment_window_secs: u64,

    /// Balance polling interval of each watcher, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Reconciliation sweep period, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Timeout of a single RPC call, in seconds.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Addresses provisioned into the pool on start.
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Chat bridge endpoint. Messages are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Address the chat event listener binds. No listener runs when unset.
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkProfile {
    NetworkProfile::Dev
}

fn default_token_symbol() -> String {
    "USDT".to_string()
}

fn default_payment_window_secs() -> u64 {
    3_600
}

fn default_poll_interval_secs() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    120
}

fn default_rpc_timeout_secs() -> u64 {
    10
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./paywatch_data")
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Effective token decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
            .unwrap_or_else(|| self.network.default_decimals())
    }

    /// Effective RPC endpoint.
    pub fn rpc_url(&self) -> &str {
        match &self.rpc_url {
            Some(url) => url,
            None => match self.network {
                NetworkProfile::Dev => "https://rpc.sepolia.org",
                NetworkProfile::Prod => "https://bsc-dataseed.binance.org",
            },
        }
    }

    /// The configured token contract. Required to run the engine.
    pub fn token_contract(&self) -> Result<ChainAddress, EngineError> {
        let raw = self
            .token_contract
            .as_deref()
            .ok_or_else(|| EngineError::Config("token_contract is not set".into()))?;
        Ok(ChainAddress::parse(raw)?)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let intervals = [
            ("payment_window_secs", self.payment_window_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("rpc_timeout_secs", self.rpc_timeout_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(EngineError::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.decimals() > MAX_DECIMALS {
            return Err(EngineError::Config(format!(
                "decimals must be at most {MAX_DECIMALS}"
            )));
        }
        if self.token_contract.is_some() {
            self.token_contract()?;
        }
        self.pool_addresses()?;
        Ok(())
    }

    /// Parsed pool provisioning list.
    pub fn pool_addresses(&self) -> Result<Vec<ChainAddress>, EngineError> {
        self.addresses
            .iter()
            .map(|raw| ChainAddress::parse(raw).map_err(EngineError::from))
            .collect()
    }

    /// Runtime settings for [`crate::PaymentEngine`].
    pub fn settings(&self) -> Result<EngineSettings, EngineError> {
        self.validate()?;
        Ok(EngineSettings {
            payment_window_secs: self.payment_window_secs,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            decimals: self.decimals(),
            token_symbol: self.token_symbol.clone(),
            chain_name: self.network.chain_name().to_string(),
            addresses: self.pool_addresses()?,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: None,
            token_contract: None,
            token_symbol: default_token_symbol(),
            decimals: None,
            payment_window_secs: default_payment_window_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            data_dir: default_data_dir(),
            addresses: Vec::new(),
            webhook_url: None,
            listen_addr: None,
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

/// Validated, runtime form of the configuration handed to the engine.
///
/// Intervals are [`Duration`]s so tests can poll at millisecond granularity.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub payment_window_secs: u64,
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
    pub decimals: u8,
    pub token_symbol: String,
    pub chain_name: String,
    pub addresses: Vec<ChainAddress>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            payment_window_secs: default_payment_window_secs(),
            poll_interval: Duration::from_secs(default_poll_interval_secs()),
            sweep_interval: Duration::from_secs(default_sweep_interval_secs()),
            decimals: NetworkProfile::Dev.default_decimals(),
            token_symbol: default_token_symbol(),
            chain_name: NetworkProfile::Dev.chain_name().to_string(),
            addresses: Vec::new(),
        }
    }
}
