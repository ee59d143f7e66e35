//! LMDB storage backend for the paywatch payment engine.
//!
//! Implements all storage traits from `paywatch-store` using the `heed` LMDB
//! bindings. Each logical table maps to one named LMDB database within a
//! single environment.
//!
//! LMDB admits exactly one write transaction at a time. Every operation that
//! must be atomic (claiming a free address, creating a record, closing a
//! record together with its address) runs inside one write transaction, which
//! gives the same guarantee as a row lock with skip-on-contention.

pub mod address;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod offer;
pub mod service;

pub use environment::LmdbStore;
pub use error::LmdbError;
pub use environment::DEFAULT_MAP_SIZE;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
