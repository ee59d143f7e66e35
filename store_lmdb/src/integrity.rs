//! LMDB database integrity checks.
//!
//! Run on startup to detect inconsistent state early, before the engine
//! begins leasing addresses.

use std::path::Path;

use paywatch_store::{AddressStore, ServiceStore, StoreError};

use crate::LmdbStore;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub addresses: u64,
    pub services: u64,
    pub waiting: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Cross-check the pool, the service records and the waiting index.
///
/// Detects waiting records whose address is unknown to the pool, two waiting
/// records sharing one address, and index entries for terminal records.
/// Problems are collected into the report rather than failing the check.
pub fn check_integrity(store: &LmdbStore) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport::default();

    let addresses = store.list_addresses()?;
    report.addresses = addresses.len() as u64;

    let services = store.list_services()?;
    report.services = services.len() as u64;

    let waiting = store.waiting_services()?;
    report.waiting = waiting.len() as u64;

    let mut seen = std::collections::HashSet::new();
    for record in &waiting {
        if !record.is_waiting() {
            report.errors.push(format!(
                "waiting index lists {} in status {}",
                record.id, record.status
            ));
        }
        if !addresses.iter().any(|e| e.address == record.address) {
            report.errors.push(format!(
                "{} references address {} missing from the pool",
                record.id, record.address
            ));
        }
        if !seen.insert(record.address.clone()) {
            report.errors.push(format!(
                "address {} is bound to more than one waiting service",
                record.address
            ));
        }
    }

    let indexed = services.iter().filter(|r| r.is_waiting()).count() as u64;
    if indexed != report.waiting {
        report.errors.push(format!(
            "{} records are waiting but the index holds {}",
            indexed, report.waiting
        ));
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
