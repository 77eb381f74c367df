//! Event and sweep loops
//!
//! The event loop shards watch events over a fixed set of workers by entity
//! identity, so events for one entity are applied in arrival order while
//! different entities proceed concurrently. The sweep loop periodically asks
//! every handler to remove stale nodes.

use super::dispatcher::{Dispatcher, SweepReport};
use crate::health::{components, HealthRegistry};
use crate::models::{EntityKind, WatchEvent};
use crate::observability::{StructuredLogger, SyncMetrics};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Configuration for the event loop
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Number of concurrent workers (default: 4)
    pub workers: usize,
    /// Capacity of the ingestion channel (default: 1024)
    pub buffer_size: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            buffer_size: 1024,
        }
    }
}

#[derive(Debug, Error)]
#[error("event loop is shut down")]
pub struct EventLoopClosed;

/// Producer side of the event loop
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<WatchEvent>,
    metrics: SyncMetrics,
}

impl EventSender {
    /// Enqueue an event, waiting while the channel is full
    pub async fn send(&self, event: WatchEvent) -> Result<(), EventLoopClosed> {
        self.tx.send(event).await.map_err(|_| EventLoopClosed)?;
        self.metrics.inc_queued();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything a worker needs to apply one event
#[derive(Clone)]
struct WorkerContext {
    dispatcher: Arc<Dispatcher>,
    health: HealthRegistry,
    metrics: SyncMetrics,
    logger: StructuredLogger,
}

impl WorkerContext {
    async fn handle(&self, event: WatchEvent) {
        let kind = event.object.kind();
        let start = Instant::now();
        let result = self.dispatcher.dispatch(&event).await;
        self.metrics
            .observe_event(kind, event.operation, start.elapsed(), result.is_ok());
        self.metrics.dec_queued();

        match result {
            Ok(()) => {
                debug!(
                    kind = %kind,
                    operation = %event.operation,
                    namespace = %event.object.namespace(),
                    name = %event.object.name(),
                    "Mirrored event to storage"
                );
                self.health.record_success(components::STORAGE).await;
            }
            Err(e) => {
                self.logger.log_event_failure(
                    kind,
                    event.operation,
                    event.object.namespace(),
                    event.object.name(),
                    &e.to_string(),
                );
                if e.is_storage() {
                    self.health
                        .record_failure(components::STORAGE, e.to_string())
                        .await;
                }
            }
        }
    }
}

/// Consumes watch events and applies them through the dispatcher
pub struct EventLoop {
    context: WorkerContext,
    config: EventLoopConfig,
    events_rx: mpsc::Receiver<WatchEvent>,
}

impl EventLoop {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        config: EventLoopConfig,
        health: HealthRegistry,
        metrics: SyncMetrics,
        logger: StructuredLogger,
    ) -> (Self, EventSender) {
        let (tx, events_rx) = mpsc::channel(config.buffer_size.max(1));
        let sender = EventSender {
            tx,
            metrics: metrics.clone(),
        };

        let event_loop = Self {
            context: WorkerContext {
                dispatcher,
                health,
                metrics,
                logger,
            },
            config,
            events_rx,
        };

        (event_loop, sender)
    }

    /// Run until shutdown is signalled or every sender is dropped
    ///
    /// Workers finish the event they are applying before exiting. Events
    /// still buffered at shutdown are discarded.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let worker_count = self.config.workers.max(1);
        info!(workers = worker_count, "Starting event loop");
        self.context.health.register(components::EVENT_LOOP).await;

        let per_worker = (self.config.buffer_size / worker_count).max(1);
        let mut shards = Vec::with_capacity(worker_count);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (tx, rx) = mpsc::channel(per_worker);
            shards.push(tx);
            handles.push(tokio::spawn(run_worker(
                id,
                self.context.clone(),
                rx,
                shutdown.resubscribe(),
            )));
        }

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        warn!("Event channel closed");
                        self.context
                            .health
                            .set_unhealthy(components::EVENT_LOOP, "event channel closed")
                            .await;
                        break;
                    };
                    let shard = shard_for(&event, worker_count);
                    if shards[shard].send(event).await.is_err() {
                        warn!(worker = shard, "Worker stopped, dropping event");
                        self.context.metrics.dec_queued();
                    }
                }
                _ = shutdown.recv() => {
                    let discarded = discard_pending(&mut self.events_rx, &self.context.metrics);
                    info!(discarded, "Shutting down event loop");
                    break;
                }
            }
        }

        drop(shards);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Event worker panicked");
            }
        }
    }
}

async fn run_worker(
    id: usize,
    context: WorkerContext,
    mut rx: mpsc::Receiver<WatchEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!(worker = id, "Event worker started");
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => context.handle(event).await,
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    let discarded = discard_pending(&mut rx, &context.metrics);
    debug!(worker = id, discarded, "Event worker stopped");
}

/// Close `rx` and drop everything still buffered in it, releasing each
/// dropped event from the queued gauge
fn discard_pending(rx: &mut mpsc::Receiver<WatchEvent>, metrics: &SyncMetrics) -> usize {
    rx.close();
    let mut discarded = 0;
    while rx.try_recv().is_ok() {
        metrics.dec_queued();
        discarded += 1;
    }
    discarded
}

/// Worker index for an event; stable for a given entity
fn shard_for(event: &WatchEvent, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    (
        event.object.kind(),
        event.object.namespace(),
        event.object.name(),
    )
        .hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Periodically removes stale storage nodes through every handler
pub struct SweepLoop {
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    health: HealthRegistry,
    metrics: SyncMetrics,
    logger: StructuredLogger,
}

impl SweepLoop {
    /// Default period between sweeps
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

    pub fn new(
        dispatcher: Arc<Dispatcher>,
        interval: Duration,
        health: HealthRegistry,
        metrics: SyncMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            dispatcher,
            interval,
            health,
            metrics,
            logger,
        }
    }

    /// Sweep every handler once and record the outcome
    pub async fn sweep_once(&self) -> SweepReport {
        let start = Instant::now();
        let report = self.dispatcher.check_dirty_all().await;
        self.metrics.inc_sweep_runs();

        let failed: Vec<EntityKind> = report.failed.iter().map(|(kind, _)| *kind).collect();
        for kind in &failed {
            self.metrics.inc_sweep_failures(*kind);
        }
        self.logger
            .log_sweep(report.succeeded.len(), &failed, start.elapsed());

        if report.is_clean() {
            self.health.record_success(components::SWEEPER).await;
        } else {
            let kinds: Vec<&str> = failed.iter().map(EntityKind::as_str).collect();
            self.health
                .record_failure(
                    components::SWEEPER,
                    format!("sweep failed for {}", kinds.join(", ")),
                )
                .await;
        }
        report
    }

    /// Sweep on every tick until shutdown; the first sweep runs one full
    /// period after start
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let period = self.interval.max(Duration::from_secs(1));
        info!(interval_secs = period.as_secs(), "Starting sweep loop");
        self.health.register(components::SWEEPER).await;

        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down sweep loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigMap, ObjectMeta};

    fn config_map(namespace: &str, name: &str) -> WatchEvent {
        WatchEvent::add(ConfigMap {
            object_meta: ObjectMeta::new(namespace, name),
            ..Default::default()
        })
    }

    #[test]
    fn test_event_loop_config_default() {
        let config = EventLoopConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.buffer_size, 1024);
    }

    #[test]
    fn test_same_entity_same_shard() {
        let add = config_map("ns", "cfg");
        let delete = WatchEvent::delete(add.object.clone());

        for workers in 1..9 {
            assert_eq!(shard_for(&add, workers), shard_for(&delete, workers));
            assert!(shard_for(&add, workers) < workers);
        }
    }

    #[tokio::test]
    async fn test_discard_pending_releases_buffered_events() {
        let (tx, mut rx) = mpsc::channel(8);
        for name in ["a", "b", "c"] {
            tx.send(config_map("ns", name)).await.unwrap();
        }

        let metrics = SyncMetrics::new();
        assert_eq!(discard_pending(&mut rx, &metrics), 3);

        // The channel is closed, so nothing more can be queued behind it
        assert!(tx.send(config_map("ns", "d")).await.is_err());
        assert_eq!(discard_pending(&mut rx, &metrics), 0);
    }
}
