//! paywatch payment engine.
//!
//! Leases addresses from a pool under mutual exclusion, tracks each payment
//! attempt from creation to settlement, and polls on-chain balances until
//! the expected amount arrives or the deadline passes.
//!
//! - [`AddressPool`] wraps the store's atomic claim.
//! - [`BalanceWatcher`] polls one leased address per waiting record.
//! - [`WatcherScheduler`] owns the watcher tasks, keyed by service id.
//! - [`ReconciliationSweeper`] periodically expires overdue records and
//!   restarts missing watchers, including after a restart.
//! - [`PaymentEngine`] wires the above together.
//! - [`ChatDispatcher`] turns inbound chat events into engine calls, and
//!   [`ChatEventServer`] receives them over HTTP.
//!
//! The persisted store is the single source of truth: every terminal
//! transition and its address release is one store operation.

mod context;

pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod messages;
pub mod metrics;
pub mod pool;
pub mod scheduler;
pub mod shutdown;
pub mod sweeper;
pub mod watcher;

pub use chat::{ChatDispatcher, ChatEvent, ChatIntent, ChatOutcome};
pub use config::{EngineConfig, EngineSettings};
pub use engine::PaymentEngine;
pub use error::EngineError;
pub use inbound::ChatEventServer;
pub use metrics::EngineMetrics;
pub use pool::AddressPool;
pub use scheduler::WatcherScheduler;
pub use shutdown::ShutdownController;
pub use sweeper::{ReconciliationSweeper, SweepReport};
pub use watcher::{evaluate, BalanceWatcher, Verdict, WatchState};

/// Lower bound for task periods; `tokio::time::interval` rejects zero.
pub(crate) const MIN_PERIOD: std::time::Duration = std::time::Duration::from_millis(1);
