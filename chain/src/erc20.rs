//! ERC-20 `balanceOf` over Ethereum JSON-RPC.
//!
//! Issues `eth_call` against the token contract at the `latest` block and
//! decodes the 32-byte return word. Works for any EVM chain (Sepolia, BSC).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use paywatch_types::{ChainAddress, TokenAmount};

use crate::{BalanceSource, ChainError};

/// 4-byte selector of `balanceOf(address)`.
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client reading one token contract's balances.
pub struct Erc20RpcClient {
    rpc_url: String,
    token: ChainAddress,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl Erc20RpcClient {
    /// Create a client for `token` behind the JSON-RPC endpoint at `rpc_url`.
    pub fn new(rpc_url: &str, token: ChainAddress) -> Self {
        Self {
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token(&self) -> &ChainAddress {
        &self.token
    }

    /// ABI-encoded call data: selector followed by the address left-padded
    /// to 32 bytes.
    pub fn call_data(address: &ChainAddress) -> String {
        format!("0x{}{:0>64}", BALANCE_OF_SELECTOR, address.hex_body())
    }

    /// Query the token balance of `address`.
    pub async fn fetch_balance(&self, address: &ChainAddress) -> Result<TokenAmount, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "eth_call",
            "params": [
                { "to": self.token.as_str(), "data": Self::call_data(address) },
                "latest"
            ],
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::RateLimited);
        }
        if !status.is_success() {
            return Err(ChainError::Http(status.as_u16()));
        }

        let parsed: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ChainError::Malformed(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = parsed
            .result
            .ok_or_else(|| ChainError::Malformed("response has neither result nor error".into()))?;
        decode_uint(&result)
    }
}

/// Decode a `0x`-prefixed big-endian uint256 word into a u128 amount.
pub fn decode_uint(word: &str) -> Result<TokenAmount, ChainError> {
    let hex = word
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Malformed(format!("result is not 0x-prefixed: {word}")))?;
    if hex.is_empty() {
        // `0x` comes back when the target has no code, i.e. a wrong contract address.
        return Err(ChainError::Malformed(
            "empty eth_call result; is the token contract deployed?".into(),
        ));
    }
    let significant = hex.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(TokenAmount::ZERO);
    }
    if significant.len() > 32 {
        return Err(ChainError::Malformed(format!(
            "balance does not fit in 128 bits: {word}"
        )));
    }
    u128::from_str_radix(significant, 16)
        .map(TokenAmount::new)
        .map_err(|e| ChainError::Malformed(format!("bad hex word {word}: {e}")))
}

#[async_trait]
impl BalanceSource for Erc20RpcClient {
    async fn balance_of(&self, address: &ChainAddress) -> Result<TokenAmount, ChainError> {
        self.fetch_balance(address).await
    }

    fn name(&self) -> &str {
        "erc20-json-rpc"
    }
}
