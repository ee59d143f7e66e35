//! Nullable balance source: scripted token balances for testing.

use async_trait::async_trait;
use paywatch_chain::{BalanceSource, ChainError};
use paywatch_types::{ChainAddress, TokenAmount};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// An in-memory ledger of token balances.
///
/// Unknown addresses hold zero. Failures can be switched on to exercise the
/// retry paths of callers.
#[derive(Debug, Default)]
pub struct NullBalanceSource {
    balances: Mutex<HashMap<ChainAddress, TokenAmount>>,
    failing: AtomicBool,
    rate_limited: AtomicBool,
    calls: AtomicU64,
}

impl NullBalanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the balance of an address.
    pub fn set_balance(&self, address: &ChainAddress, amount: TokenAmount) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(address.clone(), amount);
        }
    }

    /// Credit an address, as an incoming transfer would.
    pub fn deposit(&self, address: &ChainAddress, amount: TokenAmount) {
        if let Ok(mut balances) = self.balances.lock() {
            let entry = balances.entry(address.clone()).or_insert(TokenAmount::ZERO);
            *entry = entry
                .checked_add(amount)
                .unwrap_or(TokenAmount::new(u128::MAX));
        }
    }

    /// Make every query fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every query fail as rate limited.
    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    /// Number of queries answered or failed so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for NullBalanceSource {
    async fn balance_of(&self, address: &ChainAddress) -> Result<TokenAmount, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(ChainError::RateLimited);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("null balance source offline".into()));
        }
        let balances = self
            .balances
            .lock()
            .map_err(|_| ChainError::Transport("balance ledger poisoned".into()))?;
        Ok(balances.get(address).copied().unwrap_or(TokenAmount::ZERO))
    }

    fn name(&self) -> &str {
        "null"
    }
}
