//! Prometheus metrics for the payment engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`]; the daemon renders it in
//! the text exposition format when it shuts down.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of engine-level metrics.
pub struct EngineMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Payment requests that were persisted in `Waiting`.
    pub requests_created: IntCounter,
    /// Records moved to `Paid`.
    pub payments_confirmed: IntCounter,
    /// Records moved to `Expired`, by watchers or the sweeper.
    pub payments_expired: IntCounter,
    /// Records moved to `Cancelled` by their buyer.
    pub payments_cancelled: IntCounter,
    /// Failed balance queries (baseline reads and polls).
    pub rpc_failures: IntCounter,
    /// Completed reconciliation sweeps.
    pub sweeps: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Watcher tasks currently running.
    pub active_watchers: IntGauge,
    /// Addresses currently free in the pool.
    pub free_addresses: IntGauge,
}

impl EngineMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_created = register_int_counter_with_registry!(
            Opts::new(
                "paywatch_requests_created_total",
                "Payment requests created"
            ),
            registry
        )?;
        let payments_confirmed = register_int_counter_with_registry!(
            Opts::new(
                "paywatch_payments_confirmed_total",
                "Payments confirmed on chain"
            ),
            registry
        )?;
        let payments_expired = register_int_counter_with_registry!(
            Opts::new(
                "paywatch_payments_expired_total",
                "Payment requests that expired unpaid"
            ),
            registry
        )?;
        let payments_cancelled = register_int_counter_with_registry!(
            Opts::new(
                "paywatch_payments_cancelled_total",
                "Payment requests cancelled by the buyer"
            ),
            registry
        )?;
        let rpc_failures = register_int_counter_with_registry!(
            Opts::new("paywatch_rpc_failures_total", "Failed balance queries"),
            registry
        )?;
        let sweeps = register_int_counter_with_registry!(
            Opts::new("paywatch_sweeps_total", "Completed reconciliation sweeps"),
            registry
        )?;

        let active_watchers = register_int_gauge_with_registry!(
            Opts::new("paywatch_active_watchers", "Running balance watchers"),
            registry
        )?;
        let free_addresses = register_int_gauge_with_registry!(
            Opts::new("paywatch_free_addresses", "Free addresses in the pool"),
            registry
        )?;

        Ok(Self {
            registry,
            requests_created,
            payments_confirmed,
            payments_expired,
            payments_cancelled,
            rpc_failures,
            sweeps,
            active_watchers,
            free_addresses,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
