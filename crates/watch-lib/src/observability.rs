//! Prometheus metrics and structured event logging for storage sync

use crate::models::{EntityKind, WatchOperation};
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for storage round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<SyncMetricsInner> = OnceLock::new();

struct SyncMetricsInner {
    events_total: IntCounterVec,
    event_errors_total: IntCounterVec,
    event_latency_seconds: HistogramVec,
    events_queued: IntGauge,
    sweep_runs_total: IntCounter,
    sweep_failures_total: IntCounterVec,
}

impl SyncMetricsInner {
    fn new() -> Self {
        Self {
            events_total: register_int_counter_vec!(
                "storage_watch_events_total",
                "Watch events handled, by kind and operation",
                &["kind", "operation"]
            )
            .expect("Failed to register events_total"),

            event_errors_total: register_int_counter_vec!(
                "storage_watch_event_errors_total",
                "Watch events whose storage write failed, by kind and operation",
                &["kind", "operation"]
            )
            .expect("Failed to register event_errors_total"),

            event_latency_seconds: register_histogram_vec!(
                "storage_watch_event_latency_seconds",
                "Time spent writing one watch event to storage",
                &["kind"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register event_latency_seconds"),

            events_queued: register_int_gauge!(
                "storage_watch_events_queued",
                "Watch events accepted but not yet handled"
            )
            .expect("Failed to register events_queued"),

            sweep_runs_total: register_int_counter!(
                "storage_watch_sweep_runs_total",
                "Completed stale-node sweeps"
            )
            .expect("Failed to register sweep_runs_total"),

            sweep_failures_total: register_int_counter_vec!(
                "storage_watch_sweep_failures_total",
                "Per-kind sweep failures",
                &["kind"]
            )
            .expect("Failed to register sweep_failures_total"),
        }
    }
}

/// Cheap handle to the process-wide sync metrics
///
/// Clones share the same registered collectors.
#[derive(Clone)]
pub struct SyncMetrics {
    _private: (),
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SyncMetricsInner {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new)
    }

    /// Record one handled event and how long its storage write took
    pub fn observe_event(
        &self,
        kind: EntityKind,
        operation: WatchOperation,
        elapsed: Duration,
        ok: bool,
    ) {
        let labels = [kind.as_str(), operation.as_str()];
        self.inner().events_total.with_label_values(&labels).inc();
        if !ok {
            self.inner().event_errors_total.with_label_values(&labels).inc();
        }
        self.inner()
            .event_latency_seconds
            .with_label_values(&[kind.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_queued(&self) {
        self.inner().events_queued.inc();
    }

    pub fn dec_queued(&self) {
        self.inner().events_queued.dec();
    }

    pub fn inc_sweep_runs(&self) {
        self.inner().sweep_runs_total.inc();
    }

    pub fn inc_sweep_failures(&self, kind: EntityKind) {
        self.inner()
            .sweep_failures_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }
}

/// Event-style log records for lifecycle and sweep outcomes
#[derive(Clone)]
pub struct StructuredLogger {
    cluster_id: String,
}

impl StructuredLogger {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
        }
    }

    pub fn log_startup(&self, storage_endpoint: &str, kinds: &[EntityKind], dry_run: bool) {
        let kinds: Vec<&str> = kinds.iter().map(EntityKind::as_str).collect();
        info!(
            event = "watch_started",
            cluster = %self.cluster_id,
            storage_endpoint = %storage_endpoint,
            kinds = ?kinds,
            dry_run = dry_run,
            "Storage watch started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "watch_stopped",
            cluster = %self.cluster_id,
            reason = %reason,
            "Storage watch stopped"
        );
    }

    /// Record a storage write failure for one entity
    pub fn log_event_failure(
        &self,
        kind: EntityKind,
        operation: WatchOperation,
        namespace: &str,
        name: &str,
        error: &str,
    ) {
        warn!(
            event = "storage_write_failed",
            cluster = %self.cluster_id,
            kind = %kind,
            operation = %operation,
            namespace = %namespace,
            name = %name,
            error = %error,
            "Failed to mirror entity to storage"
        );
    }

    pub fn log_sweep(&self, succeeded: usize, failed: &[EntityKind], elapsed: Duration) {
        if failed.is_empty() {
            info!(
                event = "sweep_completed",
                cluster = %self.cluster_id,
                kinds = succeeded,
                elapsed_ms = elapsed.as_millis() as u64,
                "Stale-node sweep completed"
            );
        } else {
            let failed: Vec<&str> = failed.iter().map(EntityKind::as_str).collect();
            warn!(
                event = "sweep_completed",
                cluster = %self.cluster_id,
                kinds = succeeded,
                failed = ?failed,
                elapsed_ms = elapsed.as_millis() as u64,
                "Stale-node sweep completed with failures"
            );
        }
    }
}
