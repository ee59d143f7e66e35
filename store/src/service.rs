//! Service record storage trait.

use crate::StoreError;
use paywatch_types::{BuyerId, NewService, ServiceId, ServiceRecord, ServiceStatus, Timestamp};

/// Storage for payment attempts.
pub trait ServiceStore {
    /// Allocate an id and persist a new record in `Waiting`.
    ///
    /// Fails with [`StoreError::Duplicate`] if the buyer already has a waiting
    /// record, and with [`StoreError::Conflict`] if a waiting record already
    /// references the address. Both checks run in the same transaction as the
    /// insert.
    fn create_service(&self, new: NewService) -> Result<ServiceRecord, StoreError>;

    fn get_service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, StoreError>;

    /// Every record still in `Waiting`, ordered by id.
    fn waiting_services(&self) -> Result<Vec<ServiceRecord>, StoreError>;

    /// Every record, ordered by id.
    fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError>;

    /// The buyer's waiting record, if any.
    fn waiting_service_for_buyer(
        &self,
        buyer: &BuyerId,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self
            .waiting_services()?
            .into_iter()
            .find(|r| &r.buyer == buyer))
    }

    /// Move a waiting record to the terminal `status` and release its address,
    /// as one atomic unit.
    ///
    /// Returns the updated record if this call performed the transition, or
    /// `None` if the record does not exist or is no longer waiting. Exactly
    /// one of several racing callers observes `Some`.
    fn close_service(
        &self,
        id: ServiceId,
        status: ServiceStatus,
        at: Timestamp,
    ) -> Result<Option<ServiceRecord>, StoreError>;

    /// Mark the address of record `id` leased, but only while that record is
    /// still `Waiting`. The status check and the flag write are one atomic
    /// unit, so a concurrent [`close_service`](Self::close_service) either
    /// commits first (and this is a no-op) or releases the lease afterwards.
    ///
    /// Returns `true` if the record was waiting and its address is known to
    /// the pool.
    fn reassert_lease(&self, id: ServiceId) -> Result<bool, StoreError>;
}
