//! LMDB implementation of ServiceStore.
//!
//! Records live in `services` keyed by big-endian id, so iteration yields
//! them in creation order. The `waiting` database indexes the ids still in
//! `Waiting`; it is updated in the same write transaction as the record.

use heed::RoTxn;

use paywatch_store::{ServiceStore, StoreError};
use paywatch_types::{NewService, ServiceId, ServiceRecord, ServiceStatus, Timestamp};

use crate::address::{FREE, LEASED};
use crate::meta::{self, NEXT_SERVICE_ID_KEY};
use crate::{LmdbError, LmdbStore};

fn service_key(id: ServiceId) -> [u8; 8] {
    id.get().to_be_bytes()
}

impl LmdbStore {
    fn load_service(&self, txn: &RoTxn, key: &[u8]) -> Result<Option<ServiceRecord>, LmdbError> {
        match self.services_db.get(txn, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn load_waiting(&self, txn: &RoTxn) -> Result<Vec<ServiceRecord>, LmdbError> {
        let mut keys = Vec::new();
        for item in self.waiting_db.iter(txn)? {
            let (key, _) = item?;
            keys.push(key.to_vec());
        }
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load_service(txn, &key)? {
                Some(record) => records.push(record),
                None => tracing::warn!(
                    key = ?key,
                    "waiting index references a missing service record"
                ),
            }
        }
        Ok(records)
    }
}

impl ServiceStore for LmdbStore {
    fn create_service(&self, new: NewService) -> Result<ServiceRecord, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        let waiting = self.load_waiting(&wtxn)?;
        if waiting.iter().any(|r| r.buyer == new.buyer) {
            return Err(StoreError::Duplicate(format!(
                "buyer {} already has a waiting service",
                new.buyer
            )));
        }
        if waiting.iter().any(|r| r.address == new.address) {
            return Err(StoreError::Conflict(format!(
                "address {} is already bound to a waiting service",
                new.address
            )));
        }

        let id = meta::next_id(&self.meta_db, &mut wtxn, NEXT_SERVICE_ID_KEY)?;
        let record = ServiceRecord::from_new(ServiceId::new(id), new);
        let key = service_key(record.id);
        let bytes = bincode::serialize(&record).map_err(LmdbError::from)?;
        self.services_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.waiting_db
            .put(&mut wtxn, &key, &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record)
    }

    fn get_service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.load_service(&rtxn, &service_key(id))?)
    }

    fn waiting_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.load_waiting(&rtxn)?)
    }

    fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for item in self.services_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, bytes) = item.map_err(LmdbError::from)?;
            let record: ServiceRecord = bincode::deserialize(bytes).map_err(LmdbError::from)?;
            records.push(record);
        }
        Ok(records)
    }

    fn close_service(
        &self,
        id: ServiceId,
        status: ServiceStatus,
        at: Timestamp,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        let key = service_key(id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(mut record) = self.load_service(&wtxn, &key)? else {
            return Ok(None);
        };
        if !record.close(status, at) {
            return Ok(None);
        }

        let bytes = bincode::serialize(&record).map_err(LmdbError::from)?;
        self.services_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.waiting_db
            .delete(&mut wtxn, &key)
            .map_err(LmdbError::from)?;
        self.addresses_db
            .put(&mut wtxn, record.address.as_str().as_bytes(), &[FREE])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(Some(record))
    }

    fn reassert_lease(&self, id: ServiceId) -> Result<bool, StoreError> {
        let key = service_key(id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(record) = self.load_service(&wtxn, &key)? else {
            return Ok(false);
        };
        if !record.is_waiting() {
            return Ok(false);
        }
        let address_key = record.address.as_str().as_bytes();
        let known = self
            .addresses_db
            .get(&wtxn, address_key)
            .map_err(LmdbError::from)?
            .is_some();
        if !known {
            return Ok(false);
        }
        self.addresses_db
            .put(&mut wtxn, address_key, &[LEASED])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }
}
