//! Abstract storage traits for the paywatch payment engine.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! The store is the single source of truth for both the address pool and
//! service record status. Two operations carry the engine's correctness:
//!
//! - [`AddressStore::claim_free_address`] must select and mark a free
//!   address in one atomic step, so two concurrent callers never receive the
//!   same address.
//! - [`ServiceStore::close_service`] must move a record out of `Waiting` and
//!   release its address in one atomic step, and must refuse to touch a record
//!   that is already terminal.

pub mod address;
pub mod error;
pub mod offer;
pub mod service;

pub use address::AddressStore;
pub use error::StoreError;
pub use offer::OfferStore;
pub use service::ServiceStore;

/// Everything the payment engine needs from a backend, usable as one trait object.
pub trait PaymentStore: AddressStore + ServiceStore + OfferStore + Send + Sync {}

impl<T> PaymentStore for T where T: AddressStore + ServiceStore + OfferStore + Send + Sync {}
