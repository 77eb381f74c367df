//! Per-kind storage sync handlers
//!
//! A handler turns watch callbacks for one entity kind into data-operator
//! calls. Handlers hold only immutable configuration, so one instance is
//! shared by every event worker.

use super::convert::StorageFormat;
use super::operator::{BatchDeleteCondition, DataOperator};
use super::path::NodePath;
use crate::error::{SyncError, SyncResult};
use crate::models::{EntityKind, ExportService, StorageObject, WatchObject};
use async_trait::async_trait;
use chrono::Utc;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Nodes not refreshed within this window are considered orphaned
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(600);

/// Storage sync behaviour for one entity kind
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Kind this handler accepts
    fn kind(&self) -> EntityKind;

    /// Registry key of the handler
    fn get_type(&self) -> &'static str {
        self.kind().as_str()
    }

    async fn add(&self, object: &WatchObject) -> SyncResult<()>;

    async fn update(&self, object: &WatchObject) -> SyncResult<()>;

    /// Remove the entity's node; an already-absent node is success
    async fn delete(&self, object: &WatchObject) -> SyncResult<()>;

    /// Remove orphaned nodes of this kind, if the handler opts in
    async fn check_dirty(&self) -> SyncResult<()>;
}

/// Whether and how a handler removes nodes it stopped refreshing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPolicy {
    Disabled,
    StaleAfter(Duration),
}

impl Default for SweepPolicy {
    fn default() -> Self {
        SweepPolicy::StaleAfter(DEFAULT_STALE_THRESHOLD)
    }
}

/// Mirrors one entity kind to its namespaced storage node
pub struct MirrorHandler<T> {
    cluster_id: String,
    operator: Arc<dyn DataOperator>,
    sweep: SweepPolicy,
    _entity: PhantomData<fn() -> T>,
}

impl<T: StorageFormat> MirrorHandler<T> {
    pub fn new(cluster_id: impl Into<String>, operator: Arc<dyn DataOperator>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            operator,
            sweep: SweepPolicy::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_sweep(mut self, sweep: SweepPolicy) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        self.sweep
    }

    fn entity<'a>(&self, object: &'a WatchObject) -> SyncResult<&'a T> {
        T::from_object(object).ok_or(SyncError::KindMismatch {
            handler: T::KIND,
            object: object.kind(),
        })
    }

    fn path(&self, entity: &T) -> NodePath {
        NodePath::namespaced(&self.cluster_id, entity.namespace(), T::KIND, entity.name())
    }

    async fn upsert(&self, object: &WatchObject) -> SyncResult<()> {
        let entity = self.entity(object)?;
        let body = entity.to_storage_body(Utc::now())?;
        self.operator.create_node(&self.path(entity), &body).await
    }
}

#[async_trait]
impl<T: StorageFormat + 'static> ResourceHandler for MirrorHandler<T> {
    fn kind(&self) -> EntityKind {
        T::KIND
    }

    async fn add(&self, object: &WatchObject) -> SyncResult<()> {
        self.upsert(object).await
    }

    async fn update(&self, object: &WatchObject) -> SyncResult<()> {
        self.upsert(object).await
    }

    async fn delete(&self, object: &WatchObject) -> SyncResult<()> {
        let entity = self.entity(object)?;
        self.operator.delete_node(&self.path(entity)).await
    }

    async fn check_dirty(&self) -> SyncResult<()> {
        let SweepPolicy::StaleAfter(threshold) = self.sweep else {
            debug!(kind = %T::KIND, "Sweep disabled, skipping");
            return Ok(());
        };

        let condition = BatchDeleteCondition::older_than(Utc::now().timestamp(), threshold);
        let scope = NodePath::all_resources(&self.cluster_id, T::KIND);
        info!(
            kind = %T::KIND,
            cluster = %self.cluster_id,
            update_time_end = condition.update_time_end,
            "Removing stale storage nodes"
        );
        self.operator.delete_nodes_where(&scope, &condition).await
    }
}

/// Exported services are published to the discovery projection and to the
/// dynamic namespace tree
///
/// Stale nodes are never swept: the projection tree has no batch delete and
/// the dynamic copy is left to match it.
pub struct ExportServiceHandler {
    cluster_id: String,
    operator: Arc<dyn DataOperator>,
}

impl ExportServiceHandler {
    pub fn new(cluster_id: impl Into<String>, operator: Arc<dyn DataOperator>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            operator,
        }
    }

    fn entity<'a>(&self, object: &'a WatchObject) -> SyncResult<&'a ExportService> {
        ExportService::from_object(object).ok_or(SyncError::KindMismatch {
            handler: EntityKind::ExportService,
            object: object.kind(),
        })
    }

    fn paths(&self, service: &ExportService) -> [NodePath; 2] {
        [
            NodePath::watch(
                &self.cluster_id,
                service.namespace(),
                EntityKind::ExportService,
                service.name(),
            ),
            NodePath::namespaced(
                &self.cluster_id,
                service.namespace(),
                EntityKind::ExportService,
                service.name(),
            ),
        ]
    }

    async fn upsert(&self, object: &WatchObject) -> SyncResult<()> {
        let service = self.entity(object)?;
        let body = service.to_storage_body(Utc::now())?;
        let [watch, dynamic] = self.paths(service);

        // Both copies are attempted; the first failure wins
        let watch_result = self.operator.create_node(&watch, &body).await;
        let dynamic_result = self.operator.create_node(&dynamic, &body).await;
        watch_result.and(dynamic_result)
    }
}

#[async_trait]
impl ResourceHandler for ExportServiceHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::ExportService
    }

    async fn add(&self, object: &WatchObject) -> SyncResult<()> {
        self.upsert(object).await
    }

    async fn update(&self, object: &WatchObject) -> SyncResult<()> {
        self.upsert(object).await
    }

    async fn delete(&self, object: &WatchObject) -> SyncResult<()> {
        let service = self.entity(object)?;
        let [watch, dynamic] = self.paths(service);

        let watch_result = self.operator.delete_node(&watch).await;
        let dynamic_result = self.operator.delete_node(&dynamic).await;
        watch_result.and(dynamic_result)
    }

    async fn check_dirty(&self) -> SyncResult<()> {
        debug!(kind = %EntityKind::ExportService, "Sweep not supported, skipping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, ConfigMap, ObjectMeta};
    use crate::sync::memory::InMemoryOperator;

    #[test]
    fn test_get_type_is_kind_identifier() {
        let operator: Arc<dyn DataOperator> = Arc::new(InMemoryOperator::new());
        let handler = MirrorHandler::<ConfigMap>::new("c1", operator.clone());
        assert_eq!(handler.get_type(), "configmap");

        let export = ExportServiceHandler::new("c1", operator);
        assert_eq!(export.get_type(), "exportservice");
    }

    #[test]
    fn test_default_sweep_policy() {
        let operator: Arc<dyn DataOperator> = Arc::new(InMemoryOperator::new());
        let handler = MirrorHandler::<Application>::new("c1", operator);
        assert_eq!(
            handler.sweep_policy(),
            SweepPolicy::StaleAfter(Duration::from_secs(600))
        );
    }

    #[tokio::test]
    async fn test_wrong_kind_is_rejected() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<Application>::new("c1", Arc::new(memory.clone()));
        let object = WatchObject::from(ConfigMap {
            object_meta: ObjectMeta::new("ns", "cfg"),
            ..Default::default()
        });

        let err = handler.add(&object).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::KindMismatch {
                handler: EntityKind::Application,
                object: EntityKind::ConfigMap,
            }
        ));
        assert_eq!(memory.request_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_sweep_issues_no_request() {
        let memory = InMemoryOperator::new();
        let handler = MirrorHandler::<Application>::new("c1", Arc::new(memory.clone()))
            .with_sweep(SweepPolicy::Disabled);

        handler.check_dirty().await.unwrap();
        assert_eq!(memory.request_count(), 0);
    }
}
