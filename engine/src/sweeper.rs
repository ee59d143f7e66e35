//! Periodic reconciliation of waiting records.
//!
//! The sweep works from persisted records alone. It expires overdue records
//! directly and makes sure every other waiting record has a running watcher,
//! so the system converges after a crash even if no watcher survived.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use paywatch_types::ServiceStatus;

use crate::context::EngineContext;
use crate::{EngineError, WatcherScheduler, MIN_PERIOD};

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Overdue records this sweep moved to `Expired`.
    pub expired: usize,
    /// Records that got a new watcher.
    pub scheduled: usize,
    /// Records whose watcher was already running.
    pub already_watched: usize,
}

pub struct ReconciliationSweeper {
    ctx: Arc<EngineContext>,
    scheduler: Arc<WatcherScheduler>,
}

impl ReconciliationSweeper {
    pub(crate) fn new(ctx: Arc<EngineContext>, scheduler: Arc<WatcherScheduler>) -> Self {
        Self { ctx, scheduler }
    }

    /// Reconcile every waiting record once.
    ///
    /// A failure on one record is logged and does not stop the pass; only a
    /// failure to list the waiting records is returned.
    pub fn sweep(&self) -> Result<SweepReport, EngineError> {
        let now = self.ctx.clock.now();
        let mut report = SweepReport::default();

        for record in self.ctx.store.waiting_services()? {
            if record.is_overdue(now) {
                match self
                    .ctx
                    .store
                    .close_service(record.id, ServiceStatus::Expired, now)
                {
                    Ok(Some(closed)) => {
                        self.scheduler.cancel(record.id);
                        self.ctx.record_closed(&closed);
                        report.expired += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(service_id = %record.id, "failed to expire service: {e}");
                    }
                }
                continue;
            }

            // The startup reset frees every address; re-assert the lease of
            // addresses still bound to a waiting record. The store re-checks
            // the status, so a record closed since the snapshot stays free.
            if let Err(e) = self.ctx.store.reassert_lease(record.id) {
                tracing::warn!(
                    service_id = %record.id,
                    address = %record.address,
                    "failed to re-assert lease: {e}"
                );
            }
            if self.scheduler.schedule(record.id) {
                report.scheduled += 1;
            } else {
                report.already_watched += 1;
            }
        }

        self.ctx.metrics.sweeps.inc();
        self.ctx.refresh_free_addresses();
        tracing::info!(
            expired = report.expired,
            scheduled = report.scheduled,
            already_watched = report.already_watched,
            active_watchers = self.scheduler.active_count(),
            "reconciliation sweep complete"
        );
        Ok(report)
    }

    /// Sweep on the configured period until shutdown fires. The first sweep
    /// happens one period after the call.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.ctx.settings.sweep_interval.max(MIN_PERIOD);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("sweep task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep() {
                        tracing::error!("reconciliation sweep failed: {e}");
                    }
                }
            }
        }
    }
}
