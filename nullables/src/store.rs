//! Nullable store: thread-safe in-memory storage for testing.
//!
//! Mirrors the atomic contracts of the LMDB backend: every operation runs
//! under one lock, so a claim or a close is indivisible.

use paywatch_store::{AddressStore, OfferStore, ServiceStore, StoreError};
use paywatch_types::{
    AddressEntry, ChainAddress, NewOffer, NewService, Offer, OfferId, ServiceId, ServiceRecord,
    ServiceStatus, Timestamp,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    /// address -> leased
    addresses: BTreeMap<ChainAddress, bool>,
    services: BTreeMap<ServiceId, ServiceRecord>,
    offers: BTreeMap<OfferId, Offer>,
    next_service_id: u64,
    next_offer_id: u64,
}

/// An in-memory address, service and offer store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    inner: Mutex<Inner>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with free addresses.
    pub fn with_addresses(addresses: &[ChainAddress]) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            for address in addresses {
                inner.addresses.insert(address.clone(), false);
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("null store lock poisoned".into()))
    }
}

impl AddressStore for NullStore {
    fn put_address(&self, address: &ChainAddress) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.addresses.contains_key(address) {
            return Ok(false);
        }
        inner.addresses.insert(address.clone(), false);
        Ok(true)
    }

    fn claim_free_address(&self) -> Result<Option<ChainAddress>, StoreError> {
        let mut inner = self.lock()?;
        let free = inner
            .addresses
            .iter_mut()
            .find(|(_, leased)| !**leased)
            .map(|(address, leased)| {
                *leased = true;
                address.clone()
            });
        Ok(free)
    }

    fn release_address(&self, address: &ChainAddress) -> Result<(), StoreError> {
        if let Some(leased) = self.lock()?.addresses.get_mut(address) {
            *leased = false;
        }
        Ok(())
    }

    fn reset_leases(&self) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let mut count = 0;
        for leased in inner.addresses.values_mut() {
            if *leased {
                *leased = false;
                count += 1;
            }
        }
        Ok(count)
    }

    fn list_addresses(&self) -> Result<Vec<AddressEntry>, StoreError> {
        Ok(self
            .lock()?
            .addresses
            .iter()
            .map(|(address, leased)| AddressEntry {
                address: address.clone(),
                leased: *leased,
            })
            .collect())
    }
}

impl ServiceStore for NullStore {
    fn create_service(&self, new: NewService) -> Result<ServiceRecord, StoreError> {
        let mut inner = self.lock()?;
        let mut waiting = inner.services.values().filter(|r| r.is_waiting());
        if waiting.clone().any(|r| r.buyer == new.buyer) {
            return Err(StoreError::Duplicate(format!(
                "buyer {} already has a waiting service",
                new.buyer
            )));
        }
        if waiting.any(|r| r.address == new.address) {
            return Err(StoreError::Conflict(format!(
                "address {} is already bound to a waiting service",
                new.address
            )));
        }

        inner.next_service_id += 1;
        let record = ServiceRecord::from_new(ServiceId::new(inner.next_service_id), new);
        inner.services.insert(record.id, record.clone());
        Ok(record)
    }

    fn get_service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.lock()?.services.get(&id).cloned())
    }

    fn waiting_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        Ok(self
            .lock()?
            .services
            .values()
            .filter(|r| r.is_waiting())
            .cloned()
            .collect())
    }

    fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        Ok(self.lock()?.services.values().cloned().collect())
    }

    fn close_service(
        &self,
        id: ServiceId,
        status: ServiceStatus,
        at: Timestamp,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        let mut inner = self.lock()?;
        let Some(record) = inner.services.get_mut(&id) else {
            return Ok(None);
        };
        if !record.close(status, at) {
            return Ok(None);
        }
        let record = record.clone();
        if let Some(leased) = inner.addresses.get_mut(&record.address) {
            *leased = false;
        }
        Ok(Some(record))
    }

    fn reassert_lease(&self, id: ServiceId) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(address) = inner
            .services
            .get(&id)
            .filter(|r| r.is_waiting())
            .map(|r| r.address.clone())
        else {
            return Ok(false);
        };
        match inner.addresses.get_mut(&address) {
            Some(leased) => {
                *leased = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl OfferStore for NullStore {
    fn create_offer(&self, new: NewOffer) -> Result<Offer, StoreError> {
        let mut inner = self.lock()?;
        inner.next_offer_id += 1;
        let offer = Offer::from_new(OfferId::new(inner.next_offer_id), new);
        inner.offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        Ok(self.lock()?.offers.get(&id).cloned())
    }

    fn list_offers(&self) -> Result<Vec<Offer>, StoreError> {
        Ok(self.lock()?.offers.values().cloned().collect())
    }
}
