//! Schema version and id counters kept in the `meta` database.

use heed::types::Bytes;
use heed::{Database, RoTxn, RwTxn};

use crate::LmdbError;

/// Current on-disk layout version.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
pub(crate) const NEXT_SERVICE_ID_KEY: &[u8] = b"next_service_id";
pub(crate) const NEXT_OFFER_ID_KEY: &[u8] = b"next_offer_id";

/// Read the stored schema version, `0` for a fresh environment.
pub fn schema_version(db: &Database<Bytes, Bytes>, txn: &RoTxn) -> Result<u32, LmdbError> {
    match db.get(txn, SCHEMA_VERSION_KEY)? {
        Some(bytes) => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                LmdbError::Serialization("schema_version has unexpected byte length".to_string())
            })?;
            Ok(u32::from_le_bytes(arr))
        }
        None => Ok(0),
    }
}

/// Stamp a fresh environment with [`SCHEMA_VERSION`], or reject one written
/// by an incompatible version.
pub(crate) fn ensure_schema_version(
    db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
) -> Result<(), LmdbError> {
    match schema_version(db, wtxn)? {
        0 => {
            db.put(wtxn, SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_le_bytes())?;
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        found => Err(LmdbError::SchemaMismatch {
            found,
            expected: SCHEMA_VERSION,
        }),
    }
}

/// Allocate the next id from a counter. Ids start at 1.
pub(crate) fn next_id(
    db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
    key: &[u8],
) -> Result<u64, LmdbError> {
    let current = match db.get(wtxn, key)? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                LmdbError::Serialization("id counter has unexpected byte length".to_string())
            })?;
            u64::from_le_bytes(arr)
        }
        None => 1,
    };
    db.put(wtxn, key, &(current + 1).to_le_bytes())?;
    Ok(current)
}
