//! The payment engine: creates payment requests and wires the pool, the
//! watchers and the sweeper together.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use paywatch_chain::BalanceSource;
use paywatch_notify::Notifier;
use paywatch_store::{PaymentStore, StoreError};
use paywatch_types::{
    BuyerId, ChainAddress, ChatTarget, Clock, NewOffer, NewService, Offer, OfferId, ServiceId,
    ServiceRecord, ServiceStatus, TokenAmount,
};

use crate::context::EngineContext;
use crate::{
    messages, AddressPool, EngineError, EngineMetrics, EngineSettings, ReconciliationSweeper,
    ShutdownController, SweepReport, WatcherScheduler,
};

/// How many leases a single request may burn through when the store reports
/// the leased address as still bound to a waiting record.
const MAX_LEASE_ATTEMPTS: usize = 4;

pub struct PaymentEngine {
    ctx: Arc<EngineContext>,
    pool: AddressPool,
    scheduler: Arc<WatcherScheduler>,
    sweeper: Arc<ReconciliationSweeper>,
    shutdown: Arc<ShutdownController>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl PaymentEngine {
    pub fn new(
        settings: EngineSettings,
        store: Arc<dyn PaymentStore>,
        chain: Arc<dyn BalanceSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let ctx = Arc::new(EngineContext {
            store: Arc::clone(&store),
            chain,
            notifier,
            clock,
            metrics: Arc::new(EngineMetrics::new()?),
            settings,
        });
        let shutdown = Arc::new(ShutdownController::new());
        let scheduler = Arc::new(WatcherScheduler::new(
            Arc::clone(&ctx),
            Arc::clone(&shutdown),
        ));
        let sweeper = Arc::new(ReconciliationSweeper::new(
            Arc::clone(&ctx),
            Arc::clone(&scheduler),
        ));
        Ok(Self {
            ctx,
            pool: AddressPool::new(store),
            scheduler,
            sweeper,
            shutdown,
            sweep_task: Mutex::new(None),
        })
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn scheduler(&self) -> &WatcherScheduler {
        &self.scheduler
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.ctx.metrics
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.ctx.settings
    }

    /// The controller whose signal stops the sweep task and every watcher.
    pub fn shutdown_handle(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Bring the engine up.
    ///
    /// Resets the pool, provisions the configured addresses, runs one sweep
    /// synchronously (expiring overdue records and re-watching the rest),
    /// then spawns the periodic sweep task.
    pub async fn start(&self) -> Result<SweepReport, EngineError> {
        let mut sweep_task = self
            .sweep_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sweep_task.is_some() {
            return Err(EngineError::Config("engine already started".into()));
        }

        self.pool.reset()?;
        self.pool.provision(&self.ctx.settings.addresses)?;
        let report = self.sweeper.sweep()?;

        let shutdown_rx = self.shutdown.subscribe();
        *sweep_task = Some(tokio::spawn(Arc::clone(&self.sweeper).run(shutdown_rx)));
        let free_addresses = self.pool.free_count()?;
        tracing::info!(
            free_addresses,
            chain = %self.ctx.settings.chain_name,
            balance_source = self.ctx.chain.name(),
            "payment engine started"
        );
        Ok(report)
    }

    /// Stop the sweep task and every watcher. Persisted state is untouched;
    /// the next start resumes from it.
    pub async fn stop(&self) {
        tracing::info!("payment engine stopping");
        self.shutdown.shutdown();
        self.scheduler.stop_all().await;

        let handle = self
            .sweep_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("sweep task ended abnormally: {e}");
            }
        }
        tracing::info!("payment engine stopped");
    }

    /// Run one reconciliation sweep now.
    pub fn sweep_now(&self) -> Result<SweepReport, EngineError> {
        self.sweeper.sweep()
    }

    /// Lease an address for `buyer`, snapshot its balance and start watching it.
    pub async fn create_payment_request(
        &self,
        buyer: &BuyerId,
        amount: TokenAmount,
        offer_id: Option<OfferId>,
    ) -> Result<ServiceRecord, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount(
                "payment amount must be positive".into(),
            ));
        }
        if self.ctx.store.waiting_service_for_buyer(buyer)?.is_some() {
            return Err(EngineError::NoFreeResource(format!(
                "buyer {buyer} already has a pending payment"
            )));
        }

        for attempt in 1..=MAX_LEASE_ATTEMPTS {
            let Some(address) = self.pool.lease()? else {
                return Err(EngineError::NoFreeResource("no free addresses".into()));
            };

            let baseline = match self.ctx.chain.balance_of(&address).await {
                Ok(balance) => balance,
                Err(e) => {
                    self.ctx.metrics.rpc_failures.inc();
                    self.release_after_failure(&address);
                    return Err(EngineError::UpstreamUnavailable(format!(
                        "baseline balance of {address}: {e}"
                    )));
                }
            };

            let now = self.ctx.clock.now();
            let new = NewService {
                buyer: buyer.clone(),
                amount,
                address: address.clone(),
                baseline,
                deadline: now.plus_secs(self.ctx.settings.payment_window_secs),
                offer_id,
                created_at: now,
            };
            match self.ctx.store.create_service(new) {
                Ok(record) => {
                    self.scheduler.schedule(record.id);
                    self.ctx.metrics.requests_created.inc();
                    self.ctx.refresh_free_addresses();
                    tracing::info!(
                        service_id = %record.id,
                        buyer = %buyer,
                        address = %record.address,
                        amount = %record.amount,
                        baseline = %record.baseline,
                        deadline = %record.deadline,
                        "payment request created"
                    );
                    return Ok(record);
                }
                Err(StoreError::Duplicate(msg)) => {
                    self.release_after_failure(&address);
                    return Err(EngineError::NoFreeResource(msg));
                }
                Err(StoreError::Conflict(msg)) => {
                    // The address really is in use; keep it leased.
                    tracing::warn!(attempt, address = %address, "{msg}; leasing another address");
                }
                Err(e) => {
                    self.release_after_failure(&address);
                    return Err(e.into());
                }
            }
        }

        Err(EngineError::NoFreeResource(
            "no unbound address available".into(),
        ))
    }

    fn release_after_failure(&self, address: &ChainAddress) {
        if let Err(e) = self.pool.release(address) {
            tracing::error!(address = %address, "failed to release address: {e}");
        }
    }

    /// Cancel the buyer's waiting payment and release its address.
    pub fn cancel(&self, id: ServiceId, buyer: &BuyerId) -> Result<ServiceRecord, EngineError> {
        self.ctx
            .store
            .get_service(id)?
            .filter(|record| &record.buyer == buyer && record.is_waiting())
            .ok_or_else(|| EngineError::service_not_found(id))?;

        let closed = self
            .ctx
            .store
            .close_service(id, ServiceStatus::Cancelled, self.ctx.clock.now())?
            .ok_or_else(|| EngineError::service_not_found(id))?;
        self.scheduler.cancel(id);
        self.ctx.record_closed(&closed);
        Ok(closed)
    }

    /// Persist an offer priced from a decimal string and announce it.
    pub fn publish_offer(
        &self,
        price: &str,
        description: &str,
        chat: ChatTarget,
        delivery: Option<String>,
    ) -> Result<Offer, EngineError> {
        let price = TokenAmount::parse_units(price, self.ctx.settings.decimals)?;
        if price.is_zero() {
            return Err(EngineError::InvalidAmount(
                "offer price must be positive".into(),
            ));
        }
        let offer = self.ctx.store.create_offer(NewOffer {
            price,
            description: description.to_string(),
            chat,
            delivery,
            created_at: self.ctx.clock.now(),
        })?;
        tracing::info!(offer_id = %offer.id, price = %offer.price, chat = %offer.chat, "offer published");
        self.ctx.notifier.send_message(
            &offer.chat,
            &messages::offer_announcement(&offer, &self.ctx.settings),
        );
        Ok(offer)
    }

    /// Create a payment request for an offer and send the buyer an invoice.
    pub async fn request_offer(
        &self,
        buyer: &BuyerId,
        offer_id: OfferId,
    ) -> Result<ServiceRecord, EngineError> {
        let offer = self
            .ctx
            .store
            .get_offer(offer_id)?
            .ok_or_else(|| EngineError::offer_not_found(offer_id))?;
        let record = self
            .create_payment_request(buyer, offer.price, Some(offer.id))
            .await?;
        self.ctx.notifier.send_message(
            &buyer.chat_target(),
            &messages::invoice(&record, &self.ctx.settings),
        );
        Ok(record)
    }

    /// Send a free-form reply into a chat.
    pub(crate) fn reply(&self, chat: &ChatTarget, text: &str) {
        self.ctx.notifier.send_message(chat, text);
    }

    pub fn service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, EngineError> {
        Ok(self.ctx.store.get_service(id)?)
    }

    pub fn waiting_services(&self) -> Result<Vec<ServiceRecord>, EngineError> {
        Ok(self.ctx.store.waiting_services()?)
    }

    pub fn offers(&self) -> Result<Vec<Offer>, EngineError> {
        Ok(self.ctx.store.list_offers()?)
    }
}
