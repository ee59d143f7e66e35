//! Registry of running balance watchers, keyed by service id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use paywatch_types::ServiceId;

use crate::context::EngineContext;
use crate::watcher::BalanceWatcher;
use crate::ShutdownController;

/// Owns one cancellable tokio task per watched service.
///
/// Scheduling an id whose task is still running is a no-op, which lets the
/// sweeper re-schedule every waiting record on each pass.
pub struct WatcherScheduler {
    ctx: Arc<EngineContext>,
    shutdown: Arc<ShutdownController>,
    tasks: Mutex<HashMap<ServiceId, JoinHandle<()>>>,
}

impl WatcherScheduler {
    pub(crate) fn new(ctx: Arc<EngineContext>, shutdown: Arc<ShutdownController>) -> Self {
        Self {
            ctx,
            shutdown,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<ServiceId, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, tasks: &mut HashMap<ServiceId, JoinHandle<()>>) {
        tasks.retain(|_, handle| !handle.is_finished());
        self.ctx.metrics.active_watchers.set(tasks.len() as i64);
    }

    /// Start a watcher for `id` unless one is already running.
    ///
    /// Returns `true` if a new task was spawned. Must be called from within a
    /// tokio runtime.
    pub fn schedule(&self, id: ServiceId) -> bool {
        let mut tasks = self.tasks();
        self.prune(&mut tasks);
        if tasks.contains_key(&id) {
            return false;
        }
        let watcher = BalanceWatcher::new(id, Arc::clone(&self.ctx));
        let handle = tokio::spawn(watcher.run(self.shutdown.subscribe()));
        tasks.insert(id, handle);
        self.ctx.metrics.active_watchers.set(tasks.len() as i64);
        tracing::debug!(service_id = %id, "watcher scheduled");
        true
    }

    /// Whether a watcher for `id` is still running.
    pub fn is_watching(&self, id: ServiceId) -> bool {
        self.tasks()
            .get(&id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort the watcher for `id`. Returns `true` if one was registered.
    pub fn cancel(&self, id: ServiceId) -> bool {
        let mut tasks = self.tasks();
        let removed = tasks.remove(&id);
        if let Some(handle) = &removed {
            handle.abort();
        }
        self.ctx.metrics.active_watchers.set(tasks.len() as i64);
        removed.is_some()
    }

    /// Abort every watcher and wait for the tasks to wind down.
    pub async fn stop_all(&self) {
        let handles: Vec<_> = self.tasks().drain().map(|(_, handle)| handle).collect();
        self.ctx.metrics.active_watchers.set(0);
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("watcher task ended abnormally: {e}");
                }
            }
        }
    }

    /// Number of watchers still running.
    pub fn active_count(&self) -> usize {
        let mut tasks = self.tasks();
        self.prune(&mut tasks);
        tasks.len()
    }
}
