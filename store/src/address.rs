//! Address pool storage trait.

use crate::StoreError;
use paywatch_types::{AddressEntry, ChainAddress};

/// Storage for the pool of leasable addresses and their `leased` flag.
pub trait AddressStore {
    /// Insert an address as free. Returns `false` if it already exists, in
    /// which case its flag is left untouched.
    fn put_address(&self, address: &ChainAddress) -> Result<bool, StoreError>;

    /// Atomically pick one free address, mark it leased, and return it.
    ///
    /// Returns `None` when every address is leased. Implementations must not
    /// split this into a read followed by a separate write.
    fn claim_free_address(&self) -> Result<Option<ChainAddress>, StoreError>;

    /// Mark an address free. Releasing a free or unknown address is a no-op.
    fn release_address(&self, address: &ChainAddress) -> Result<(), StoreError>;

    /// Force every address free. Returns how many were leased.
    fn reset_leases(&self) -> Result<u64, StoreError>;

    /// All addresses with their flags.
    fn list_addresses(&self) -> Result<Vec<AddressEntry>, StoreError>;

    /// Number of addresses currently free.
    fn free_address_count(&self) -> Result<u64, StoreError> {
        self.list_addresses()
            .map(|entries| entries.iter().filter(|e| !e.leased).count() as u64)
    }
}
