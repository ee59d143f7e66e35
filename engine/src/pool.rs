//! The pool of leasable addresses.
//!
//! The store's atomic claim is the only exclusion mechanism; the pool itself
//! keeps no in-memory state.

use std::sync::Arc;

use paywatch_store::PaymentStore;
use paywatch_types::{AddressEntry, ChainAddress};

use crate::EngineError;

/// Hands out addresses under mutual exclusion.
#[derive(Clone)]
pub struct AddressPool {
    store: Arc<dyn PaymentStore>,
}

impl AddressPool {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    /// Claim one free address, or `None` when every address is leased.
    pub fn lease(&self) -> Result<Option<ChainAddress>, EngineError> {
        let leased = self.store.claim_free_address()?;
        if let Some(address) = &leased {
            tracing::debug!(address = %address, "address leased");
        }
        Ok(leased)
    }

    /// Return an address to the pool. Idempotent.
    pub fn release(&self, address: &ChainAddress) -> Result<(), EngineError> {
        self.store.release_address(address)?;
        tracing::debug!(address = %address, "address released");
        Ok(())
    }

    /// Force every address free. Returns how many were leased.
    pub fn reset(&self) -> Result<u64, EngineError> {
        let count = self.store.reset_leases()?;
        tracing::info!(count, "address pool reset");
        Ok(count)
    }

    /// Insert addresses as free, keeping the flag of ones already known.
    /// Returns how many were new.
    pub fn provision(&self, addresses: &[ChainAddress]) -> Result<usize, EngineError> {
        let mut added = 0;
        for address in addresses {
            if self.store.put_address(address)? {
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!(added, total = addresses.len(), "addresses provisioned");
        }
        Ok(added)
    }

    pub fn snapshot(&self) -> Result<Vec<AddressEntry>, EngineError> {
        Ok(self.store.list_addresses()?)
    }

    pub fn free_count(&self) -> Result<u64, EngineError> {
        Ok(self.store.free_address_count()?)
    }
}
