//! Collaborators shared by the engine, its watchers and the sweeper.

use std::sync::Arc;

use paywatch_chain::BalanceSource;
use paywatch_notify::Notifier;
use paywatch_store::PaymentStore;
use paywatch_types::{Clock, ServiceRecord, ServiceStatus};

use crate::{messages, EngineMetrics, EngineSettings};

pub(crate) struct EngineContext {
    pub store: Arc<dyn PaymentStore>,
    pub chain: Arc<dyn BalanceSource>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<EngineMetrics>,
    pub settings: EngineSettings,
}

impl EngineContext {
    /// Count and announce a terminal transition this process committed.
    ///
    /// Must only be called by the caller whose `close_service` returned the
    /// record, so each buyer hears about a closure exactly once.
    pub fn record_closed(&self, record: &ServiceRecord) {
        let text = match record.status {
            ServiceStatus::Paid => {
                self.metrics.payments_confirmed.inc();
                let delivery = self.delivery_for(record);
                messages::payment_confirmed(record, delivery.as_deref(), &self.settings)
            }
            ServiceStatus::Expired => {
                self.metrics.payments_expired.inc();
                messages::payment_expired(record)
            }
            ServiceStatus::Cancelled => {
                self.metrics.payments_cancelled.inc();
                messages::payment_cancelled(record)
            }
            ServiceStatus::Waiting => return,
        };
        tracing::info!(
            service_id = %record.id,
            buyer = %record.buyer,
            address = %record.address,
            status = %record.status,
            "service closed, address released"
        );
        self.notifier
            .send_message(&record.buyer.chat_target(), &text);
        self.refresh_free_addresses();
    }

    /// Delivery text of the offer a record was created for.
    fn delivery_for(&self, record: &ServiceRecord) -> Option<String> {
        let offer_id = record.offer_id?;
        match self.store.get_offer(offer_id) {
            Ok(offer) => offer.and_then(|o| o.delivery),
            Err(e) => {
                tracing::warn!(service_id = %record.id, offer_id = %offer_id, "failed to load offer: {e}");
                None
            }
        }
    }

    pub fn refresh_free_addresses(&self) {
        match self.store.free_address_count() {
            Ok(count) => self.metrics.free_addresses.set(count as i64),
            Err(e) => tracing::debug!("failed to count free addresses: {e}"),
        }
    }
}
