//! Integration tests for storage sync
//!
//! These tests verify:
//! - Idempotent upserts and tolerant deletes
//! - The stale-node sweep window and the export-service opt-out
//! - Dispatcher routing and sweep isolation between handlers
//! - End-to-end event processing through the sharded event loop

use super::*;
use crate::error::{SyncError, SyncResult};
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{
    Application, ConfigMap, ConfigMapItem, ContainerEndpoint, Deployment, Endpoint, EntityKind,
    ExportBackend, ExportService, ObjectMeta, TaskGroup, WatchEvent,
};
use crate::observability::{StructuredLogger, SyncMetrics};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const CLUSTER: &str = "BCS-MESOS-10001";

fn application(namespace: &str, id: &str) -> Application {
    Application {
        id: id.to_string(),
        run_as: namespace.to_string(),
        define_instances: 2,
        ..Default::default()
    }
}

fn config_map(namespace: &str, name: &str) -> ConfigMap {
    let mut data = std::collections::BTreeMap::new();
    data.insert(
        "app.conf".to_string(),
        ConfigMapItem {
            content: "listen 8080".to_string(),
            ..Default::default()
        },
    );
    ConfigMap {
        object_meta: ObjectMeta::new(namespace, name),
        data,
        ..Default::default()
    }
}

fn export_service(namespace: &str, name: &str) -> ExportService {
    ExportService {
        cluster: CLUSTER.to_string(),
        namespace: namespace.to_string(),
        service_name: name.to_string(),
        service_port: 8080,
        protocol: "tcp".to_string(),
        backends: vec![ExportBackend {
            target_ip: "10.0.0.8".to_string(),
            target_port: 31000,
            weight: 10,
        }],
        ..Default::default()
    }
}

fn endpoint(namespace: &str, name: &str) -> Endpoint {
    Endpoint {
        object_meta: ObjectMeta::new(namespace, name),
        endpoints: vec![ContainerEndpoint {
            container_ip: "172.16.0.4".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Every kind registered against one operator
fn full_dispatcher(operator: Arc<dyn DataOperator>) -> Dispatcher {
    RegistryBuilder::new()
        .register(Arc::new(MirrorHandler::<Application>::new(CLUSTER, operator.clone())))
        .and_then(|b| b.register(Arc::new(MirrorHandler::<TaskGroup>::new(CLUSTER, operator.clone()))))
        .and_then(|b| b.register(Arc::new(MirrorHandler::<Deployment>::new(CLUSTER, operator.clone()))))
        .and_then(|b| b.register(Arc::new(MirrorHandler::<Endpoint>::new(CLUSTER, operator.clone()))))
        .and_then(|b| b.register(Arc::new(ExportServiceHandler::new(CLUSTER, operator.clone()))))
        .and_then(|b| b.register(Arc::new(MirrorHandler::<ConfigMap>::new(CLUSTER, operator))))
        .unwrap()
        .build()
}

fn injected(method: &'static str, path: &NodePath) -> SyncError {
    SyncError::Status {
        method,
        path: path.to_string(),
        status: 500,
        body: "injected".to_string(),
    }
}

/// Delegates to memory but fails selected calls
#[derive(Clone, Default)]
struct FaultyOperator {
    memory: InMemoryOperator,
    fail_watch_writes: bool,
    fail_sweep_of: Option<EntityKind>,
    fail_everything: bool,
}

#[async_trait]
impl DataOperator for FaultyOperator {
    async fn create_node(&self, path: &NodePath, body: &serde_json::Value) -> SyncResult<()> {
        if self.fail_everything || (self.fail_watch_writes && matches!(path, NodePath::Watch { .. })) {
            return Err(injected("PUT", path));
        }
        self.memory.create_node(path, body).await
    }

    async fn delete_node(&self, path: &NodePath) -> SyncResult<()> {
        if self.fail_everything {
            return Err(injected("DELETE", path));
        }
        self.memory.delete_node(path).await
    }

    async fn delete_nodes_where(
        &self,
        scope: &NodePath,
        condition: &BatchDeleteCondition,
    ) -> SyncResult<()> {
        if self.fail_everything || self.fail_sweep_of == Some(scope.kind()) {
            return Err(injected("DELETE", scope));
        }
        self.memory.delete_nodes_where(scope, condition).await
    }
}

mod handler_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_upsert_leaves_one_node() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<ConfigMap>::new(CLUSTER, Arc::new(memory.clone()));
        let object = config_map("prod", "nginx-conf").into();

        handler.add(&object).await.unwrap();
        let first = memory
            .get(&NodePath::namespaced(CLUSTER, "prod", EntityKind::ConfigMap, "nginx-conf"))
            .unwrap();
        handler.update(&object).await.unwrap();
        handler.update(&object).await.unwrap();

        assert_eq!(memory.len(), 1);
        let last = memory
            .get(&NodePath::namespaced(CLUSTER, "prod", EntityKind::ConfigMap, "nginx-conf"))
            .unwrap();
        assert_eq!(first.body, last.body);
        assert_eq!(last.body["datas"]["app.conf"]["content"], "listen 8080");
    }

    #[tokio::test]
    async fn test_application_upsert_writes_status_body() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<Application>::new(CLUSTER, Arc::new(memory.clone()));

        handler.add(&application("prod", "web").into()).await.unwrap();

        let node = memory
            .get(&NodePath::namespaced(CLUSTER, "prod", EntityKind::Application, "web"))
            .unwrap();
        assert_eq!(node.body["metadata"]["name"], "web");
        assert_eq!(node.body["instance"], 2);
        assert!(node.body["report_time"].is_string());
    }

    #[tokio::test]
    async fn test_delete_of_absent_node_succeeds() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<Application>::new(CLUSTER, Arc::new(memory.clone()));
        let object = application("prod", "web").into();

        handler.delete(&object).await.unwrap();
        handler.add(&object).await.unwrap();
        handler.delete(&object).await.unwrap();
        handler.delete(&object).await.unwrap();

        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_nodes() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<Application>::new(CLUSTER, Arc::new(memory.clone()));
        let now = Utc::now().timestamp();
        let stale = NodePath::namespaced(CLUSTER, "prod", EntityKind::Application, "gone");
        let fresh = NodePath::namespaced(CLUSTER, "prod", EntityKind::Application, "alive");
        memory.upsert_at(stale.clone(), json!({}), now - 700);
        memory.upsert_at(fresh.clone(), json!({}), now - 100);

        handler.check_dirty().await.unwrap();

        assert!(!memory.contains(&stale));
        assert!(memory.contains(&fresh));
    }

    #[tokio::test]
    async fn test_sweep_honours_custom_threshold() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<Endpoint>::new(CLUSTER, Arc::new(memory.clone()))
            .with_sweep(SweepPolicy::StaleAfter(Duration::from_secs(60)));
        let now = Utc::now().timestamp();
        let node = NodePath::namespaced(CLUSTER, "prod", EntityKind::Endpoint, "web");
        memory.upsert_at(node.clone(), json!({}), now - 100);

        handler.check_dirty().await.unwrap();

        assert!(!memory.contains(&node));
    }

    #[tokio::test]
    async fn test_export_service_writes_both_trees() {
        let memory = InMemoryOperator::new();
        let handler = ExportServiceHandler::new(CLUSTER, Arc::new(memory.clone()));
        let object = export_service("game", "gate").into();

        handler.add(&object).await.unwrap();

        let watch = NodePath::watch(CLUSTER, "game", EntityKind::ExportService, "gate");
        let dynamic = NodePath::namespaced(CLUSTER, "game", EntityKind::ExportService, "gate");
        assert_eq!(memory.get(&watch).unwrap().body, memory.get(&dynamic).unwrap().body);
        assert_eq!(memory.get(&watch).unwrap().body["service_port"], 8080);

        handler.delete(&object).await.unwrap();
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_export_service_never_sweeps() {
        let memory = InMemoryOperator::new();
        let handler = ExportServiceHandler::new(CLUSTER, Arc::new(memory.clone()));
        let stale = NodePath::namespaced(CLUSTER, "game", EntityKind::ExportService, "old");
        memory.upsert_at(stale.clone(), json!({}), 0);

        handler.check_dirty().await.unwrap();

        assert!(memory.contains(&stale));
        assert_eq!(memory.request_count(), 0);
    }

    #[tokio::test]
    async fn test_export_service_attempts_second_write_after_failure() {
        let operator = FaultyOperator {
            fail_watch_writes: true,
            ..Default::default()
        };
        let handler = ExportServiceHandler::new(CLUSTER, Arc::new(operator.clone()));

        let err = handler
            .add(&export_service("game", "gate").into())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Status { method: "PUT", .. }));
        assert!(operator
            .memory
            .contains(&NodePath::namespaced(CLUSTER, "game", EntityKind::ExportService, "gate")));
    }

    #[tokio::test]
    async fn test_operator_errors_are_returned_unmodified() {
        let operator = FaultyOperator {
            fail_everything: true,
            ..Default::default()
        };
        let handler = MirrorHandler::<Endpoint>::new(CLUSTER, Arc::new(operator));

        let err = handler
            .update(&endpoint("prod", "web").into())
            .await
            .unwrap_err();

        match err {
            SyncError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "injected");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

mod dispatcher_tests {
    use super::*;

    #[tokio::test]
    async fn test_every_kind_routes_to_its_handler() {
        let memory = InMemoryOperator::new();
        let dispatcher = full_dispatcher(Arc::new(memory.clone()));
        dispatcher.ensure_registered(&EntityKind::ALL).unwrap();

        let events = [
            WatchEvent::add(application("prod", "web")),
            WatchEvent::add(TaskGroup {
                id: "0.web.prod.10001.1".to_string(),
                run_as: "prod".to_string(),
                ..Default::default()
            }),
            WatchEvent::add(Deployment {
                object_meta: ObjectMeta::new("prod", "web-deploy"),
                ..Default::default()
            }),
            WatchEvent::add(endpoint("prod", "web")),
            WatchEvent::add(config_map("prod", "web-conf")),
        ];
        for event in &events {
            dispatcher.dispatch(event).await.unwrap();
        }

        for event in &events {
            let path = NodePath::namespaced(
                CLUSTER,
                event.object.namespace(),
                event.object.kind(),
                event.object.name(),
            );
            assert!(memory.contains(&path), "missing {}", path);
        }
        assert_eq!(memory.len(), events.len());
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_reported() {
        let dispatcher = RegistryBuilder::new()
            .register(Arc::new(MirrorHandler::<Application>::new(
                CLUSTER,
                Arc::new(InMemoryOperator::new()),
            )))
            .unwrap()
            .build();

        let err = dispatcher
            .dispatch(&WatchEvent::add(config_map("prod", "cfg")))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnregisteredKind(EntityKind::ConfigMap)));
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failing_handler() {
        let operator = FaultyOperator {
            fail_sweep_of: Some(EntityKind::Application),
            ..Default::default()
        };
        let dispatcher = full_dispatcher(Arc::new(operator.clone()));
        let stale_endpoint = NodePath::namespaced(CLUSTER, "prod", EntityKind::Endpoint, "old");
        operator.memory.upsert_at(stale_endpoint.clone(), json!({}), 0);

        let report = dispatcher.check_dirty_all().await;

        assert_eq!(report.attempted(), EntityKind::ALL.len());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, EntityKind::Application);
        assert!(report.succeeded.contains(&EntityKind::Endpoint));
        assert!(report.succeeded.contains(&EntityKind::ExportService));
        assert!(!operator.memory.contains(&stale_endpoint));
    }
}

mod loop_tests {
    use super::*;

    fn event_loop(
        operator: Arc<dyn DataOperator>,
        health: HealthRegistry,
        workers: usize,
    ) -> (EventLoop, EventSender) {
        EventLoop::new(
            Arc::new(full_dispatcher(operator)),
            EventLoopConfig {
                workers,
                buffer_size: 64,
            },
            health,
            SyncMetrics::new(),
            StructuredLogger::new(CLUSTER),
        )
    }

    #[tokio::test]
    async fn test_events_for_one_entity_apply_in_order() {
        let memory = InMemoryOperator::new();
        let (event_loop, sender) = event_loop(Arc::new(memory.clone()), HealthRegistry::new(), 4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(event_loop.run(shutdown_rx));

        for i in 0..20 {
            let name = format!("cfg-{}", i % 5);
            sender
                .send(WatchEvent::add(config_map("prod", &name)))
                .await
                .unwrap();
            sender
                .send(WatchEvent::delete(config_map("prod", &name)))
                .await
                .unwrap();
        }
        sender
            .send(WatchEvent::add(config_map("prod", "kept")))
            .await
            .unwrap();

        drop(sender);
        handle.await.unwrap();

        assert_eq!(memory.len(), 1);
        assert!(memory.contains(&NodePath::namespaced(CLUSTER, "prod", EntityKind::ConfigMap, "kept")));
    }

    #[tokio::test]
    async fn test_shutdown_stops_event_loop() {
        let memory = InMemoryOperator::new();
        let (event_loop, sender) = event_loop(Arc::new(memory), HealthRegistry::new(), 2);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(event_loop.run(shutdown_rx));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("event loop did not stop")
            .unwrap();

        assert!(sender.is_closed());
        assert!(sender
            .send(WatchEvent::add(config_map("prod", "late")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_storage_failures_degrade_health() {
        let operator = FaultyOperator {
            fail_everything: true,
            ..Default::default()
        };
        let health = HealthRegistry::with_threshold(2);
        let (event_loop, sender) = event_loop(Arc::new(operator), health.clone(), 1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(event_loop.run(shutdown_rx));

        for name in ["a", "b"] {
            sender
                .send(WatchEvent::update(endpoint("prod", name)))
                .await
                .unwrap();
        }
        drop(sender);
        handle.await.unwrap();

        let status = health.health().await;
        assert_eq!(
            status.components[components::STORAGE].status,
            ComponentStatus::Unhealthy
        );
        assert_eq!(status.components[components::STORAGE].consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_sweep_once_records_failures() {
        let operator = FaultyOperator {
            fail_sweep_of: Some(EntityKind::TaskGroup),
            ..Default::default()
        };
        let health = HealthRegistry::new();
        let sweeper = SweepLoop::new(
            Arc::new(full_dispatcher(Arc::new(operator))),
            SweepLoop::DEFAULT_INTERVAL,
            health.clone(),
            SyncMetrics::new(),
            StructuredLogger::new(CLUSTER),
        );

        let report = sweeper.sweep_once().await;
        assert!(!report.is_clean());

        let status = health.health().await;
        let sweeper_health = &status.components[components::SWEEPER];
        assert_eq!(sweeper_health.status, ComponentStatus::Degraded);
        assert!(sweeper_health
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("taskgroup"));
    }

    #[tokio::test]
    async fn test_sweep_loop_waits_one_period() {
        let memory = InMemoryOperator::new();
        let sweeper = SweepLoop::new(
            Arc::new(full_dispatcher(Arc::new(memory.clone()))),
            Duration::from_secs(3600),
            HealthRegistry::new(),
            SyncMetrics::new(),
            StructuredLogger::new(CLUSTER),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(memory.request_count(), 0);
    }
}
