//! Integration tests driving the payment engine end to end over nullable
//! infrastructure: in-memory store, scripted balances, a manual clock and a
//! recording notifier. Watchers poll on a short real-time interval; deadlines
//! are controlled through the clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use paywatch_engine::{EngineError, EngineSettings, PaymentEngine, SweepReport};
use paywatch_nullables::{NullBalanceSource, NullClock, NullNotifier, NullStore};
use paywatch_store::{AddressStore, OfferStore, ServiceStore, StoreError};
use paywatch_types::{
    AddressEntry, BuyerId, ChainAddress, ChatTarget, NewOffer, NewService, Offer, OfferId,
    ServiceId, ServiceRecord, ServiceStatus, Timestamp, TokenAmount,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const START: u64 = 1_000_000;

struct Harness {
    engine: Arc<PaymentEngine>,
    store: Arc<NullStore>,
    chain: Arc<NullBalanceSource>,
    notifier: Arc<NullNotifier>,
    clock: Arc<NullClock>,
}

fn addr(n: u8) -> ChainAddress {
    ChainAddress::parse(&format!("0x{:040x}", n)).unwrap()
}

fn settings(addresses: Vec<ChainAddress>) -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::from_millis(20),
        sweep_interval: Duration::from_secs(3_600),
        addresses,
        ..EngineSettings::default()
    }
}

fn harness_with(store: Arc<NullStore>, addresses: Vec<ChainAddress>) -> Harness {
    let chain = Arc::new(NullBalanceSource::new());
    let notifier = Arc::new(NullNotifier::new());
    let clock = Arc::new(NullClock::new(START));
    let engine = PaymentEngine::new(
        settings(addresses),
        Arc::clone(&store) as _,
        Arc::clone(&chain) as _,
        Arc::clone(&notifier) as _,
        Arc::clone(&clock) as _,
    )
    .expect("engine");
    Harness {
        engine: Arc::new(engine),
        store,
        chain,
        notifier,
        clock,
    }
}

async fn started(addresses: Vec<ChainAddress>) -> Harness {
    let h = harness_with(Arc::new(NullStore::new()), addresses);
    h.engine.start().await.expect("start");
    h
}

/// Poll `cond` until it holds or a few seconds pass.
async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..300 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

fn status(h: &Harness, id: ServiceId) -> ServiceStatus {
    h.engine.service(id).unwrap().expect("record").status
}

fn is_leased(h: &Harness, address: &ChainAddress) -> bool {
    h.store
        .list_addresses()
        .unwrap()
        .into_iter()
        .any(|e| &e.address == address && e.leased)
}

fn buyer(id: &str) -> BuyerId {
    BuyerId::new(id)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payment_of_expected_amount_is_confirmed_and_address_released() {
    let h = started(vec![addr(0xa1), addr(0xa2)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    assert_eq!(record.address, addr(0xa1));
    assert_eq!(record.status, ServiceStatus::Waiting);
    assert_eq!(record.deadline, Timestamp::new(START + 3_600));
    assert!(is_leased(&h, &addr(0xa1)));

    h.chain.deposit(&addr(0xa1), TokenAmount::new(100));
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Paid).await);

    let paid = h.engine.service(record.id).unwrap().unwrap();
    assert_eq!(paid.paid_at, Some(Timestamp::new(START)));
    assert!(!is_leased(&h, &addr(0xa1)));
    let messages = h.notifier.sent_to(&ChatTarget::new("u1"));
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Payment received"));
    assert_eq!(h.engine.metrics().payments_confirmed.get(), 1);
    h.engine.stop().await;
}

#[tokio::test]
async fn unpaid_request_expires_after_the_window() {
    let h = started(vec![addr(0xa1), addr(0xa2)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(status(&h, record.id), ServiceStatus::Waiting);

    h.clock.advance(3_600);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(status(&h, record.id), ServiceStatus::Waiting);

    h.clock.advance(1);
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Expired).await);
    assert!(!is_leased(&h, &addr(0xa1)));
    assert!(h.notifier.sent_to(&ChatTarget::new("u1"))[0].contains("expired"));
    h.engine.stop().await;
}

#[tokio::test]
async fn delta_is_measured_against_the_baseline() {
    let h = started(vec![addr(0xa1)]).await;
    h.chain.set_balance(&addr(0xa1), TokenAmount::new(250));
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    assert_eq!(record.baseline, TokenAmount::new(250));

    h.chain.deposit(&addr(0xa1), TokenAmount::new(99));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(status(&h, record.id), ServiceStatus::Waiting);

    h.chain.deposit(&addr(0xa1), TokenAmount::new(1));
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Paid).await);
    h.engine.stop().await;
}

#[tokio::test]
async fn funds_arriving_after_the_deadline_do_not_settle() {
    let h = started(vec![addr(0xa1)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();

    h.clock.advance(3_601);
    h.chain.deposit(&addr(0xa1), TokenAmount::new(100));
    assert!(eventually(|| status(&h, record.id) != ServiceStatus::Waiting).await);
    assert_eq!(status(&h, record.id), ServiceStatus::Expired);
    h.engine.stop().await;
}

#[tokio::test]
async fn poll_failures_are_retried_not_treated_as_unpaid() {
    let h = started(vec![addr(0xa1)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();

    h.chain.set_rate_limited(true);
    h.chain.deposit(&addr(0xa1), TokenAmount::new(100));
    assert!(eventually(|| h.engine.metrics().rpc_failures.get() >= 3).await);
    assert_eq!(status(&h, record.id), ServiceStatus::Waiting);
    assert!(is_leased(&h, &addr(0xa1)));

    h.chain.set_rate_limited(false);
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Paid).await);
    h.engine.stop().await;
}

#[tokio::test]
async fn settlement_happens_at_most_once() {
    let h = started(vec![addr(0xa1)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    h.chain.deposit(&addr(0xa1), TokenAmount::new(500));
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Paid).await);

    h.clock.advance(10_000);
    h.engine.sweep_now().unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(status(&h, record.id), ServiceStatus::Paid);
    assert_eq!(h.engine.metrics().payments_confirmed.get(), 1);
    assert_eq!(h.engine.metrics().payments_expired.get(), 0);
    assert_eq!(h.notifier.sent_to(&ChatTarget::new("u1")).len(), 1);
    h.engine.stop().await;
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn baseline_read_failure_releases_the_address() {
    let h = started(vec![addr(0xa1), addr(0xa2)]).await;
    h.chain.set_failing(true);
    let err = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
    assert_eq!(h.engine.pool().free_count().unwrap(), 2);
    assert!(h.engine.waiting_services().unwrap().is_empty());
    h.engine.stop().await;
}

#[tokio::test]
async fn buyer_with_pending_payment_gets_no_second_address() {
    let h = started(vec![addr(0xa1), addr(0xa2)]).await;
    h.engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    let err = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoFreeResource(_)));
    assert_eq!(h.engine.pool().free_count().unwrap(), 1);
    h.engine.stop().await;
}

#[tokio::test]
async fn exhausted_pool_is_reported() {
    let h = started(vec![addr(0xa1)]).await;
    h.engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    let err = h
        .engine
        .create_payment_request(&buyer("u2"), TokenAmount::new(100), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoFreeResource(_)));
    h.engine.stop().await;
}

#[tokio::test]
async fn zero_amount_is_rejected() {
    let h = started(vec![addr(0xa1)]).await;
    let err = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::ZERO, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert_eq!(h.engine.pool().free_count().unwrap(), 1);
    h.engine.stop().await;
}

#[tokio::test]
async fn address_still_bound_to_a_waiting_record_is_skipped() {
    let h = started(vec![addr(0xa1), addr(0xa2)]).await;
    let first = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    assert_eq!(first.address, addr(0xa1));

    // Frees a1 although u1 still waits on it.
    h.engine.pool().reset().unwrap();

    let second = h
        .engine
        .create_payment_request(&buyer("u2"), TokenAmount::new(100), None)
        .await
        .unwrap();
    assert_eq!(second.address, addr(0xa2));
    assert!(is_leased(&h, &addr(0xa1)));
    h.engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_share_an_address() {
    let pool: Vec<_> = (1..=3).map(addr).collect();
    let h = started(pool).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&h.engine);
        handles.push(tokio::spawn(async move {
            engine
                .create_payment_request(&BuyerId::new(format!("b{i}")), TokenAmount::new(10), None)
                .await
        }));
    }

    let mut addresses = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => addresses.push(record.address),
            Err(EngineError::NoFreeResource(_)) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), 3);
    assert_eq!(rejected, 5);
    h.engine.stop().await;
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_releases_and_stops_watching() {
    let h = started(vec![addr(0xa1)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    assert!(h.engine.scheduler().is_watching(record.id));

    assert!(matches!(
        h.engine.cancel(record.id, &buyer("intruder")),
        Err(EngineError::NotFound(_))
    ));

    let cancelled = h.engine.cancel(record.id, &buyer("u1")).unwrap();
    assert_eq!(cancelled.status, ServiceStatus::Cancelled);
    assert!(cancelled.paid_at.is_none());
    assert!(!is_leased(&h, &addr(0xa1)));
    assert!(!h.engine.scheduler().is_watching(record.id));
    assert!(h.notifier.sent_to(&ChatTarget::new("u1"))[0].contains("cancelled"));

    assert!(matches!(
        h.engine.cancel(record.id, &buyer("u1")),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.cancel(ServiceId::new(999), &buyer("u1")),
        Err(EngineError::NotFound(_))
    ));
    h.engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_cancels_produce_one_transition() {
    let h = started(vec![addr(0xa1)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&h.engine);
        handles.push(tokio::task::spawn_blocking(move || {
            engine.cancel(record.id, &BuyerId::new("u1")).is_ok()
        }));
    }
    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(h.engine.metrics().payments_cancelled.get(), 1);
    assert_eq!(h.notifier.sent_to(&ChatTarget::new("u1")).len(), 1);
    h.engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_racing_a_settling_watcher_closes_once() {
    let h = started(vec![addr(0xa1)]).await;
    let rounds = 10;

    for round in 0..rounds {
        let who = format!("u{round}");
        let record = h
            .engine
            .create_payment_request(&buyer(&who), TokenAmount::new(100), None)
            .await
            .unwrap();

        h.chain.deposit(&addr(0xa1), TokenAmount::new(100));
        let engine = Arc::clone(&h.engine);
        let canceller = BuyerId::new(who.clone());
        let cancelled = tokio::task::spawn_blocking(move || engine.cancel(record.id, &canceller))
            .await
            .unwrap();

        assert!(eventually(|| status(&h, record.id) != ServiceStatus::Waiting).await);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let closed = status(&h, record.id);
        match cancelled {
            Ok(_) => assert_eq!(closed, ServiceStatus::Cancelled),
            Err(EngineError::NotFound(_)) => assert_eq!(closed, ServiceStatus::Paid),
            Err(e) => panic!("unexpected cancel error: {e}"),
        }
        assert_eq!(h.notifier.sent_to(&ChatTarget::new(who.as_str())).len(), 1);
        assert!(!is_leased(&h, &addr(0xa1)));
        assert!(!h.engine.scheduler().is_watching(record.id));
    }

    let metrics = h.engine.metrics();
    assert_eq!(
        metrics.payments_confirmed.get() + metrics.payments_cancelled.get(),
        rounds
    );
    h.engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn watcher_and_sweeper_expire_a_record_once() {
    let h = started(vec![addr(0xa1)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();

    h.clock.advance(7_200);
    let sweep = h.engine.sweep_now().unwrap();
    assert!(sweep.expired <= 1);
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Expired).await);
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(h.engine.metrics().payments_expired.get(), 1);
    assert_eq!(h.notifier.sent_to(&ChatTarget::new("u1")).len(), 1);
    h.engine.stop().await;
}

// ---------------------------------------------------------------------------
// Reconciliation races
// ---------------------------------------------------------------------------

/// Store that, once armed, closes every record of the next waiting snapshot
/// as paid right after handing it out. Models a watcher committing while a
/// sweep is working from that snapshot.
struct ClosesAfterSnapshot {
    inner: NullStore,
    armed: AtomicBool,
}

impl AddressStore for ClosesAfterSnapshot {
    fn put_address(&self, address: &ChainAddress) -> Result<bool, StoreError> {
        self.inner.put_address(address)
    }
    fn claim_free_address(&self) -> Result<Option<ChainAddress>, StoreError> {
        self.inner.claim_free_address()
    }
    fn release_address(&self, address: &ChainAddress) -> Result<(), StoreError> {
        self.inner.release_address(address)
    }
    fn reset_leases(&self) -> Result<u64, StoreError> {
        self.inner.reset_leases()
    }
    fn list_addresses(&self) -> Result<Vec<AddressEntry>, StoreError> {
        self.inner.list_addresses()
    }
}

impl ServiceStore for ClosesAfterSnapshot {
    fn create_service(&self, new: NewService) -> Result<ServiceRecord, StoreError> {
        self.inner.create_service(new)
    }
    fn get_service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, StoreError> {
        self.inner.get_service(id)
    }
    fn waiting_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let snapshot = self.inner.waiting_services()?;
        if self.armed.swap(false, Ordering::SeqCst) {
            for record in &snapshot {
                self.inner
                    .close_service(record.id, ServiceStatus::Paid, Timestamp::new(START))?;
            }
        }
        Ok(snapshot)
    }
    fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        self.inner.list_services()
    }
    fn close_service(
        &self,
        id: ServiceId,
        status: ServiceStatus,
        at: Timestamp,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        self.inner.close_service(id, status, at)
    }
    fn reassert_lease(&self, id: ServiceId) -> Result<bool, StoreError> {
        self.inner.reassert_lease(id)
    }
}

impl OfferStore for ClosesAfterSnapshot {
    fn create_offer(&self, new: NewOffer) -> Result<Offer, StoreError> {
        self.inner.create_offer(new)
    }
    fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        self.inner.get_offer(id)
    }
    fn list_offers(&self) -> Result<Vec<Offer>, StoreError> {
        self.inner.list_offers()
    }
}

#[tokio::test]
async fn sweep_does_not_relock_an_address_closed_after_its_snapshot() {
    let store = Arc::new(ClosesAfterSnapshot {
        inner: NullStore::new(),
        armed: AtomicBool::new(false),
    });
    let engine = PaymentEngine::new(
        settings(vec![addr(0xa1)]),
        Arc::clone(&store) as _,
        Arc::new(NullBalanceSource::new()),
        Arc::new(NullNotifier::new()),
        Arc::new(NullClock::new(START)),
    )
    .expect("engine");
    engine.start().await.unwrap();

    let record = engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    store.armed.store(true, Ordering::SeqCst);
    engine.sweep_now().unwrap();

    assert_eq!(
        engine.service(record.id).unwrap().unwrap().status,
        ServiceStatus::Paid
    );
    assert!(engine.waiting_services().unwrap().is_empty());
    let entries = store.list_addresses().unwrap();
    assert!(entries.iter().all(|e| !e.leased), "leased without a waiting record: {entries:?}");

    let next = engine
        .create_payment_request(&buyer("u2"), TokenAmount::new(100), None)
        .await
        .unwrap();
    assert_eq!(next.address, addr(0xa1));
    engine.stop().await;
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offer_flow_announces_invoices_and_delivers() {
    let h = started(vec![addr(0xa1)]).await;
    let group = ChatTarget::new("group-1");
    let offer = h
        .engine
        .publish_offer(
            "1.5",
            "Premium access",
            group.clone(),
            Some("https://example.com/secret".into()),
        )
        .unwrap();
    assert_eq!(offer.price, TokenAmount::new(1_500_000));
    assert!(h.notifier.sent_to(&group)[0].contains("Premium access"));

    let record = h.engine.request_offer(&buyer("u1"), offer.id).await.unwrap();
    assert_eq!(record.offer_id, Some(offer.id));
    assert_eq!(record.amount, offer.price);
    let invoice = &h.notifier.sent_to(&ChatTarget::new("u1"))[0];
    assert!(invoice.contains("1.5 USDT"));
    assert!(invoice.contains(addr(0xa1).as_str()));

    h.chain.deposit(&addr(0xa1), TokenAmount::new(1_500_000));
    assert!(eventually(|| status(&h, record.id) == ServiceStatus::Paid).await);
    let messages = h.notifier.sent_to(&ChatTarget::new("u1"));
    assert_eq!(messages.len(), 2);
    assert!(messages[1].contains("https://example.com/secret"));
    h.engine.stop().await;
}

#[tokio::test]
async fn offer_price_must_fit_token_decimals() {
    let h = started(vec![addr(0xa1)]).await;
    let group = ChatTarget::new("group-1");
    assert!(matches!(
        h.engine.publish_offer("1.2345678", "x", group.clone(), None),
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(matches!(
        h.engine.publish_offer("0", "x", group.clone(), None),
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(matches!(
        h.engine.publish_offer("abc", "x", group, None),
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(h.engine.offers().unwrap().is_empty());
    h.engine.stop().await;
}

#[tokio::test]
async fn requesting_an_unknown_offer_fails() {
    let h = started(vec![addr(0xa1)]).await;
    let err = h
        .engine
        .request_offer(&buyer("u1"), paywatch_types::OfferId::new(42))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(h.engine.pool().free_count().unwrap(), 1);
    h.engine.stop().await;
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_reconciles_records_left_by_a_previous_process() {
    let store = Arc::new(NullStore::with_addresses(&[addr(1), addr(2), addr(3)]));
    let new_service = |buyer: &str, address: ChainAddress, deadline: u64| NewService {
        buyer: BuyerId::new(buyer),
        amount: TokenAmount::new(100),
        address,
        baseline: TokenAmount::new(50),
        deadline: Timestamp::new(deadline),
        offer_id: None,
        created_at: Timestamp::new(START - 3_600),
    };
    let a = store.claim_free_address().unwrap().unwrap();
    let b = store.claim_free_address().unwrap().unwrap();
    let overdue = store
        .create_service(new_service("old", a.clone(), START - 1))
        .unwrap();
    let pending = store
        .create_service(new_service("live", b.clone(), START + 600))
        .unwrap();

    let h = harness_with(Arc::clone(&store), Vec::new());
    h.chain.set_balance(&b, TokenAmount::new(50));
    let report = h.engine.start().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            expired: 1,
            scheduled: 1,
            already_watched: 0
        }
    );

    assert_eq!(status(&h, overdue.id), ServiceStatus::Expired);
    assert!(!is_leased(&h, &a));
    assert!(is_leased(&h, &b));
    assert!(h.engine.scheduler().is_watching(pending.id));
    assert!(h.notifier.sent_to(&ChatTarget::new("old"))[0].contains("expired"));

    h.chain.deposit(&b, TokenAmount::new(99));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(status(&h, pending.id), ServiceStatus::Waiting);
    h.chain.deposit(&b, TokenAmount::new(1));
    assert!(eventually(|| status(&h, pending.id) == ServiceStatus::Paid).await);

    let second = h.engine.sweep_now().unwrap();
    assert_eq!(second, SweepReport::default());
    h.engine.stop().await;
}

#[tokio::test]
async fn repeated_sweeps_do_not_duplicate_watchers() {
    let h = started(vec![addr(0xa1), addr(0xa2)]).await;
    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    let report = h.engine.sweep_now().unwrap();
    assert_eq!(report.already_watched, 1);
    assert_eq!(report.scheduled, 0);
    assert_eq!(h.engine.scheduler().active_count(), 1);
    assert!(h.engine.scheduler().is_watching(record.id));
    h.engine.stop().await;
}

#[tokio::test]
async fn start_twice_is_rejected_and_stop_halts_watchers() {
    let h = started(vec![addr(0xa1)]).await;
    assert!(matches!(h.engine.start().await, Err(EngineError::Config(_))));

    let record = h
        .engine
        .create_payment_request(&buyer("u1"), TokenAmount::new(100), None)
        .await
        .unwrap();
    h.engine.stop().await;
    assert_eq!(h.engine.scheduler().active_count(), 0);

    h.chain.deposit(&addr(0xa1), TokenAmount::new(100));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(status(&h, record.id), ServiceStatus::Waiting);
}
