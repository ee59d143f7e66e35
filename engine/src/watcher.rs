//! Per-service balance watcher.
//!
//! A watcher holds no state of its own: each tick reloads the record from the
//! store and decides from `(record, now, balance)` alone, so a watcher can be
//! dropped and recreated at any time without changing the outcome.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use paywatch_chain::ChainError;
use paywatch_types::{ServiceId, ServiceRecord, ServiceStatus, Timestamp, TokenAmount};

use crate::context::EngineContext;
use crate::{EngineError, MIN_PERIOD};

/// What a watcher should do with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The record is no longer waiting; stop without touching it.
    Finished,
    /// The deadline has passed.
    Expire,
    /// The expected amount has arrived.
    Settle { delta: TokenAmount },
    /// Funds are still missing.
    Pending { delta: TokenAmount },
    /// The balance is unknown; try again next tick.
    Retry,
}

/// Decide the next step for `record`.
///
/// `balance` is `None` when the balance query failed or has not been made.
/// The deadline check precedes the balance check: funds that are observed
/// after the deadline do not settle the record.
pub fn evaluate(record: &ServiceRecord, now: Timestamp, balance: Option<TokenAmount>) -> Verdict {
    if !record.is_waiting() {
        return Verdict::Finished;
    }
    if record.is_overdue(now) {
        return Verdict::Expire;
    }
    let Some(current) = balance else {
        return Verdict::Retry;
    };
    let delta = record.delta(current);
    if delta >= record.amount {
        Verdict::Settle { delta }
    } else {
        Verdict::Pending { delta }
    }
}

/// Lifecycle of a watcher task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Active,
    Done,
}

/// Polls the balance of one leased address until its record closes.
pub struct BalanceWatcher {
    id: ServiceId,
    ctx: Arc<EngineContext>,
}

impl BalanceWatcher {
    pub(crate) fn new(id: ServiceId, ctx: Arc<EngineContext>) -> Self {
        Self { id, ctx }
    }

    pub fn service_id(&self) -> ServiceId {
        self.id
    }

    /// Run one polling step.
    pub async fn tick(&self) -> WatchState {
        let record = match self.ctx.store.get_service(self.id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(service_id = %self.id, "watched service disappeared");
                return WatchState::Done;
            }
            Err(e) => {
                tracing::warn!(service_id = %self.id, "failed to load service: {e}");
                return WatchState::Active;
            }
        };

        match evaluate(&record, self.ctx.clock.now(), None) {
            Verdict::Finished => return WatchState::Done,
            Verdict::Expire => return self.close(ServiceStatus::Expired),
            _ => {}
        }

        let balance = match self.ctx.chain.balance_of(&record.address).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                self.ctx.metrics.rpc_failures.inc();
                let err = EngineError::TransientUpstreamError(e.to_string());
                tracing::warn!(
                    service_id = %self.id,
                    address = %record.address,
                    source = self.ctx.chain.name(),
                    rate_limited = matches!(e, ChainError::RateLimited),
                    "{err}; retrying next tick"
                );
                None
            }
        };

        match evaluate(&record, self.ctx.clock.now(), balance) {
            Verdict::Finished => WatchState::Done,
            Verdict::Expire => self.close(ServiceStatus::Expired),
            Verdict::Settle { delta } => {
                tracing::info!(
                    service_id = %self.id,
                    address = %record.address,
                    delta = %delta,
                    "expected amount received"
                );
                self.close(ServiceStatus::Paid)
            }
            Verdict::Pending { delta } => {
                tracing::debug!(
                    service_id = %self.id,
                    delta = %delta,
                    expected = %record.amount,
                    "payment still pending"
                );
                WatchState::Active
            }
            Verdict::Retry => WatchState::Active,
        }
    }

    fn close(&self, status: ServiceStatus) -> WatchState {
        match self
            .ctx
            .store
            .close_service(self.id, status, self.ctx.clock.now())
        {
            Ok(Some(record)) => {
                self.ctx.record_closed(&record);
                WatchState::Done
            }
            // Another path (cancel, sweeper) closed it first.
            Ok(None) => WatchState::Done,
            Err(e) => {
                tracing::warn!(service_id = %self.id, status = %status, "failed to close service: {e}");
                WatchState::Active
            }
        }
    }

    /// Tick on the poll interval until the record closes or shutdown fires.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.ctx.settings.poll_interval.max(MIN_PERIOD);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(service_id = %self.id, "watcher started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::debug!(service_id = %self.id, "watcher shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if self.tick().await == WatchState::Done {
                        tracing::debug!(service_id = %self.id, "watcher done");
                        break;
                    }
                }
            }
        }
    }
}
