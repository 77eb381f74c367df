//! Storage watch - mirrors mesos cluster state into the storage service
//!
//! Receives watch events over HTTP, writes each entity to its storage node
//! and periodically sweeps nodes that stopped being refreshed.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watch_lib::{
    health::{components, HealthRegistry},
    observability::{StructuredLogger, SyncMetrics},
    sync::{
        DataOperator, Dispatcher, EventLoop, EventLoopConfig, ExportServiceHandler,
        HttpDataOperatorBuilder, InMemoryOperator, MirrorHandler, RegistryBuilder, SweepLoop,
        SweepPolicy,
    },
    Application, ConfigMap, Deployment, Endpoint, EntityKind, TaskGroup,
};

mod api;
mod config;

use config::WatchConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting storage-watch");

    let config = WatchConfig::load()?;
    info!(cluster = %config.cluster_id, "Watch configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORAGE).await;
    health_registry.register(components::EVENT_LOOP).await;
    health_registry.register(components::SWEEPER).await;

    let metrics = SyncMetrics::new();
    let logger = StructuredLogger::new(&config.cluster_id);

    let operator = build_operator(&config)?;
    let dispatcher = Arc::new(build_dispatcher(&config, operator)?);
    dispatcher
        .ensure_registered(&EntityKind::ALL)
        .context("handler registry is incomplete")?;
    logger.log_startup(&config.storage_endpoint, &dispatcher.kinds(), config.dry_run);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let (event_loop, events) = EventLoop::new(
        dispatcher.clone(),
        EventLoopConfig {
            workers: config.event_workers,
            buffer_size: config.event_buffer,
        },
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
    );
    let event_handle = tokio::spawn(event_loop.run(shutdown_tx.subscribe()));

    let sweeper = SweepLoop::new(
        dispatcher,
        config.sweep_interval(),
        health_registry.clone(),
        metrics,
        logger.clone(),
    );
    let sweep_handle = tokio::spawn(sweeper.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), events));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    for (name, handle) in [("event_loop", event_handle), ("sweeper", sweep_handle)] {
        if let Err(e) = handle.await {
            warn!(task = name, error = %e, "Task ended abnormally");
        }
    }
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server failed"),
        Err(e) => warn!(error = %e, "API server task ended abnormally"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

fn build_operator(config: &WatchConfig) -> Result<Arc<dyn DataOperator>> {
    if config.dry_run {
        warn!("Dry-run mode: storage writes are kept in memory");
        return Ok(Arc::new(InMemoryOperator::new()));
    }

    let operator = HttpDataOperatorBuilder::new()
        .endpoint(&config.storage_endpoint)
        .connect_timeout(config.connect_timeout())
        .request_timeout(config.request_timeout())
        .build()
        .context("failed to create storage client")?;
    Ok(Arc::new(operator))
}

fn build_dispatcher(config: &WatchConfig, operator: Arc<dyn DataOperator>) -> Result<Dispatcher> {
    let cluster = config.cluster_id.as_str();
    let sweep = SweepPolicy::StaleAfter(config.stale_threshold());
    let application_sweep = if config.application_check_dirty {
        sweep
    } else {
        SweepPolicy::Disabled
    };

    let dispatcher = RegistryBuilder::new()
        .register(Arc::new(
            MirrorHandler::<Application>::new(cluster, operator.clone()).with_sweep(application_sweep),
        ))?
        .register(Arc::new(
            MirrorHandler::<TaskGroup>::new(cluster, operator.clone()).with_sweep(sweep),
        ))?
        .register(Arc::new(
            MirrorHandler::<Deployment>::new(cluster, operator.clone()).with_sweep(sweep),
        ))?
        .register(Arc::new(
            MirrorHandler::<Endpoint>::new(cluster, operator.clone()).with_sweep(sweep),
        ))?
        .register(Arc::new(ExportServiceHandler::new(cluster, operator.clone())))?
        .register(Arc::new(
            MirrorHandler::<ConfigMap>::new(cluster, operator).with_sweep(sweep),
        ))?
        .build();

    Ok(dispatcher)
}
