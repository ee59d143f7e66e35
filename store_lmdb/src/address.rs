//! LMDB implementation of AddressStore.
//!
//! Key: the normalised address string. Value: one flag byte.

use paywatch_store::{AddressStore, StoreError};
use paywatch_types::{AddressEntry, ChainAddress};

use crate::{LmdbError, LmdbStore};

pub(crate) const FREE: u8 = 0;
pub(crate) const LEASED: u8 = 1;

pub(crate) fn decode_address(key: &[u8]) -> Result<ChainAddress, LmdbError> {
    let raw = std::str::from_utf8(key)
        .map_err(|e| LmdbError::Serialization(format!("address key is not UTF-8: {e}")))?;
    ChainAddress::parse(raw).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn is_leased(flag: &[u8]) -> bool {
    flag.first() == Some(&LEASED)
}

impl AddressStore for LmdbStore {
    fn put_address(&self, address: &ChainAddress) -> Result<bool, StoreError> {
        let key = address.as_str().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .addresses_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        self.addresses_db
            .put(&mut wtxn, key, &[FREE])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn claim_free_address(&self) -> Result<Option<ChainAddress>, StoreError> {
        // The write transaction excludes every other writer until commit, so
        // the scan and the flag update form one atomic claim.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut claimed: Option<Vec<u8>> = None;
        for item in self.addresses_db.iter(&wtxn).map_err(LmdbError::from)? {
            let (key, flag) = item.map_err(LmdbError::from)?;
            if !is_leased(flag) {
                claimed = Some(key.to_vec());
                break;
            }
        }
        let Some(key) = claimed else {
            return Ok(None);
        };
        self.addresses_db
            .put(&mut wtxn, &key, &[LEASED])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(Some(decode_address(&key)?))
    }

    fn release_address(&self, address: &ChainAddress) -> Result<(), StoreError> {
        let key = address.as_str().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let known = self
            .addresses_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some();
        if known {
            self.addresses_db
                .put(&mut wtxn, key, &[FREE])
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(())
    }

    fn reset_leases(&self) -> Result<u64, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut leased = Vec::new();
        for item in self.addresses_db.iter(&wtxn).map_err(LmdbError::from)? {
            let (key, flag) = item.map_err(LmdbError::from)?;
            if is_leased(flag) {
                leased.push(key.to_vec());
            }
        }
        for key in &leased {
            self.addresses_db
                .put(&mut wtxn, key, &[FREE])
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(leased.len() as u64)
    }

    fn list_addresses(&self) -> Result<Vec<AddressEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut entries = Vec::new();
        for item in self.addresses_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, flag) = item.map_err(LmdbError::from)?;
            entries.push(AddressEntry {
                address: decode_address(key)?,
                leased: is_leased(flag),
            });
        }
        Ok(entries)
    }
}
