//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::meta;
use crate::LmdbError;

/// Default LMDB map size: 256 MiB.
pub const DEFAULT_MAP_SIZE: usize = 256 << 20;

pub(crate) const ADDRESSES_DB: &str = "addresses";
pub(crate) const SERVICES_DB: &str = "services";
pub(crate) const WAITING_DB: &str = "waiting";
pub(crate) const OFFERS_DB: &str = "offers";
pub(crate) const META_DB: &str = "meta";

/// Number of named LMDB databases.
const MAX_DBS: u32 = 5;

/// Wraps the LMDB environment and all database handles.
///
/// Layout:
/// - `addresses`: address string → one flag byte (`1` = leased)
/// - `services`: big-endian service id → bincode [`paywatch_types::ServiceRecord`]
/// - `waiting`: big-endian service id → empty; index of records in `Waiting`
/// - `offers`: big-endian offer id → bincode [`paywatch_types::Offer`]
/// - `meta`: schema version and id counters
pub struct LmdbStore {
    pub(crate) env: Arc<Env>,
    pub(crate) addresses_db: Database<Bytes, Bytes>,
    pub(crate) services_db: Database<Bytes, Bytes>,
    pub(crate) waiting_db: Database<Bytes, Bytes>,
    pub(crate) offers_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path).map_err(|e| LmdbError::Io(e.to_string()))?;

        // SAFETY: the environment is opened once per process and the data
        // file is not modified by anything other than this store.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)
        }?;

        let mut wtxn = env.write_txn()?;
        let addresses_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(ADDRESSES_DB))?;
        let services_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(SERVICES_DB))?;
        let waiting_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(WAITING_DB))?;
        let offers_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(OFFERS_DB))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(META_DB))?;
        meta::ensure_schema_version(&meta_db, &mut wtxn)?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "LMDB environment opened");

        Ok(Self {
            env: Arc::new(env),
            addresses_db,
            services_db,
            waiting_db,
            offers_db,
            meta_db,
        })
    }

    /// Access the underlying environment (integrity checks, diagnostics).
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }
}
