//! Integration tests for the LMDB backend: pool claims, record lifecycle,
//! persistence across reopen.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};

use paywatch_store::{AddressStore, OfferStore, ServiceStore, StoreError};
use paywatch_store_lmdb::{check_integrity, LmdbStore};
use paywatch_types::{
    BuyerId, ChainAddress, ChatTarget, NewOffer, NewService, ServiceStatus, Timestamp,
    TokenAmount,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MAP_SIZE: usize = 16 * 1024 * 1024;

fn temp_store() -> (tempfile::TempDir, LmdbStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = LmdbStore::open(dir.path(), MAP_SIZE).expect("open store");
    (dir, store)
}

fn addr(n: u8) -> ChainAddress {
    ChainAddress::parse(&format!("0x{}{:02x}", "0".repeat(38), n)).expect("valid address")
}

fn new_service(buyer: &str, address: ChainAddress) -> NewService {
    NewService {
        buyer: BuyerId::new(buyer),
        amount: TokenAmount::new(100),
        address,
        baseline: TokenAmount::new(5),
        deadline: Timestamp::new(3_600),
        offer_id: None,
        created_at: Timestamp::new(0),
    }
}

// ---------------------------------------------------------------------------
// Address pool
// ---------------------------------------------------------------------------

#[test]
fn put_address_is_idempotent() {
    let (_dir, store) = temp_store();
    assert!(store.put_address(&addr(1)).unwrap());
    store.claim_free_address().unwrap();
    assert!(!store.put_address(&addr(1)).unwrap());
    // Re-provisioning keeps the lease.
    assert_eq!(store.free_address_count().unwrap(), 0);
}

#[test]
fn claim_until_exhausted_then_release() {
    let (_dir, store) = temp_store();
    store.put_address(&addr(1)).unwrap();
    store.put_address(&addr(2)).unwrap();

    let a = store.claim_free_address().unwrap().expect("first claim");
    let b = store.claim_free_address().unwrap().expect("second claim");
    assert_ne!(a, b);
    assert!(store.claim_free_address().unwrap().is_none());

    store.release_address(&a).unwrap();
    store.release_address(&a).unwrap();
    assert_eq!(store.claim_free_address().unwrap(), Some(a));
}

#[test]
fn release_unknown_address_is_noop() {
    let (_dir, store) = temp_store();
    store.release_address(&addr(9)).unwrap();
    assert!(store.list_addresses().unwrap().is_empty());
}

#[test]
fn reset_frees_every_lease() {
    let (_dir, store) = temp_store();
    for n in 1..=3 {
        store.put_address(&addr(n)).unwrap();
    }
    store.claim_free_address().unwrap();
    store.claim_free_address().unwrap();
    assert_eq!(store.reset_leases().unwrap(), 2);
    assert_eq!(store.free_address_count().unwrap(), 3);
}

#[test]
fn concurrent_claims_never_share_an_address() {
    let (_dir, store) = temp_store();
    let pool_size = 4u8;
    for n in 1..=pool_size {
        store.put_address(&addr(n)).unwrap();
    }
    let store = Arc::new(store);
    let callers = 12;
    let barrier = Arc::new(Barrier::new(callers));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                store.claim_free_address().unwrap()
            })
        })
        .collect();

    let claimed: Vec<ChainAddress> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<_> = claimed.iter().cloned().collect();
    assert_eq!(claimed.len(), usize::from(pool_size));
    assert_eq!(unique.len(), claimed.len());
}

// ---------------------------------------------------------------------------
// Service records
// ---------------------------------------------------------------------------

#[test]
fn create_and_close_releases_address_atomically() {
    let (_dir, store) = temp_store();
    store.put_address(&addr(1)).unwrap();
    let leased = store.claim_free_address().unwrap().unwrap();

    let record = store.create_service(new_service("u1", leased.clone())).unwrap();
    assert_eq!(record.status, ServiceStatus::Waiting);
    assert_eq!(store.waiting_services().unwrap().len(), 1);

    let closed = store
        .close_service(record.id, ServiceStatus::Paid, Timestamp::new(120))
        .unwrap()
        .expect("first close wins");
    assert_eq!(closed.paid_at, Some(Timestamp::new(120)));
    assert!(store.waiting_services().unwrap().is_empty());
    assert_eq!(store.free_address_count().unwrap(), 1);

    // A second close observes the terminal state.
    assert!(store
        .close_service(record.id, ServiceStatus::Cancelled, Timestamp::new(130))
        .unwrap()
        .is_none());
    let stored = store.get_service(record.id).unwrap().unwrap();
    assert_eq!(stored.status, ServiceStatus::Paid);
}

#[test]
fn buyer_cannot_hold_two_waiting_services() {
    let (_dir, store) = temp_store();
    store.create_service(new_service("u1", addr(1))).unwrap();
    let err = store.create_service(new_service("u1", addr(2))).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[test]
fn address_cannot_back_two_waiting_services() {
    let (_dir, store) = temp_store();
    store.create_service(new_service("u1", addr(1))).unwrap();
    let err = store.create_service(new_service("u2", addr(1))).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn ids_are_monotonic() {
    let (_dir, store) = temp_store();
    let a = store.create_service(new_service("u1", addr(1))).unwrap();
    let b = store.create_service(new_service("u2", addr(2))).unwrap();
    assert!(b.id > a.id);
    assert_eq!(store.list_services().unwrap().len(), 2);
}

#[test]
fn close_unknown_service_returns_none() {
    let (_dir, store) = temp_store();
    let missing = paywatch_types::ServiceId::new(404);
    assert!(store
        .close_service(missing, ServiceStatus::Expired, Timestamp::new(1))
        .unwrap()
        .is_none());
}

#[test]
fn reassert_lease_only_for_waiting_records() {
    let (_dir, store) = temp_store();
    store.put_address(&addr(1)).unwrap();
    store.put_address(&addr(2)).unwrap();
    let waiting = store.create_service(new_service("u1", addr(1))).unwrap();
    let closed = store.create_service(new_service("u2", addr(2))).unwrap();
    store
        .close_service(closed.id, ServiceStatus::Paid, Timestamp::new(60))
        .unwrap()
        .expect("close");

    assert!(store.reassert_lease(waiting.id).unwrap());
    assert!(!store.reassert_lease(closed.id).unwrap());
    assert!(!store
        .reassert_lease(paywatch_types::ServiceId::new(404))
        .unwrap());

    let entries = store.list_addresses().unwrap();
    assert!(entries.iter().any(|e| e.address == addr(1) && e.leased));
    assert!(entries.iter().any(|e| e.address == addr(2) && !e.leased));
    assert!(check_integrity(&store).unwrap().is_healthy());
}

#[test]
fn reassert_lease_ignores_unprovisioned_address() {
    let (_dir, store) = temp_store();
    let record = store.create_service(new_service("u1", addr(7))).unwrap();
    assert!(!store.reassert_lease(record.id).unwrap());
    assert!(store.list_addresses().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = LmdbStore::open(dir.path(), MAP_SIZE).unwrap();
        store.put_address(&addr(1)).unwrap();
        let leased = store.claim_free_address().unwrap().unwrap();
        store.create_service(new_service("u1", leased)).unwrap().id
    };

    let store = LmdbStore::open(dir.path(), MAP_SIZE).unwrap();
    let waiting = store.waiting_services().unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].id, id);
    assert_eq!(waiting[0].baseline, TokenAmount::new(5));
    assert_eq!(store.free_address_count().unwrap(), 0);

    let report = check_integrity(&store).unwrap();
    assert!(report.is_healthy(), "{:?}", report.errors);
    assert_eq!(report.waiting, 1);
}

#[test]
fn offers_round_trip() {
    let (_dir, store) = temp_store();
    let offer = store
        .create_offer(NewOffer {
            price: TokenAmount::new(1_500_000),
            description: "Premium access".to_string(),
            chat: ChatTarget::new("-100123"),
            delivery: Some("https://example.com/secret".to_string()),
            created_at: Timestamp::new(10),
        })
        .unwrap();
    let fetched = store.get_offer(offer.id).unwrap().unwrap();
    assert_eq!(fetched, offer);
    assert_eq!(store.list_offers().unwrap().len(), 1);
}
