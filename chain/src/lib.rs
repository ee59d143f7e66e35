//! Token balance sources for the paywatch engine.
//!
//! The engine only needs one question answered: what is the token balance of
//! an address right now? [`BalanceSource`] is that seam. A failed query is an
//! `Err`, never a zero balance, so the engine can tell "nothing arrived yet"
//! apart from "the RPC endpoint is unhappy".

pub mod erc20;
pub mod error;

pub use erc20::Erc20RpcClient;
pub use error::ChainError;

use async_trait::async_trait;
use paywatch_types::{ChainAddress, TokenAmount};

/// Reads the watched token's balance at an address.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Current balance in smallest units.
    async fn balance_of(&self, address: &ChainAddress) -> Result<TokenAmount, ChainError>;

    /// Human-readable name of this source (for logs).
    fn name(&self) -> &str;
}
