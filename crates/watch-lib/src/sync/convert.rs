//! Conversion of entities into the bodies the storage service persists

use crate::error::{SyncError, SyncResult};
use crate::models::{
    AppStatus, Application, ConfigMap, Deployment, Endpoint, ExportService, ObjectMeta, PodIndex,
    StorageObject, TaskGroup, TaskStatus,
};
use crate::resource::{DataKind, Resource};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An entity that knows how to render its own storage body
pub trait StorageFormat: StorageObject {
    /// Body for the entity's node; `report_time` is stamped where the body
    /// carries one
    fn to_storage_body(&self, report_time: DateTime<Utc>) -> SyncResult<serde_json::Value>;
}

fn encode<T: StorageObject, B: Serialize>(body: &B) -> SyncResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|source| SyncError::Encode {
        kind: T::KIND,
        source,
    })
}

/// Epoch seconds as a UTC timestamp; out-of-range values map to the epoch
fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Replica-controller status body for an application
#[derive(Debug, Serialize)]
struct ReplicaControllerStatus<'a> {
    metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<DataKind>,
    instance: u64,
    /// Field name expected by existing storage consumers
    builded_instance: u64,
    running_instance: u64,
    create_time: DateTime<Utc>,
    last_update_time: DateTime<Utc>,
    report_time: DateTime<Utc>,
    status: AppStatus,
    last_status: AppStatus,
    message: &'a str,
    pods: &'a [PodIndex],
}

impl StorageFormat for Application {
    fn to_storage_body(&self, report_time: DateTime<Utc>) -> SyncResult<serde_json::Value> {
        let mut metadata = self.object_meta.clone();
        metadata.name = self.id.clone();
        metadata.namespace = self.run_as.clone();

        let status = ReplicaControllerStatus {
            metadata,
            kind: self.kind,
            instance: self.define_instances,
            builded_instance: self.instances,
            running_instance: self.running_instances,
            create_time: timestamp(self.created),
            last_update_time: timestamp(self.update_time),
            report_time,
            status: self.status,
            last_status: self.last_status,
            message: &self.message,
            pods: &self.pods,
        };
        encode::<Self, _>(&status)
    }
}

#[derive(Debug, Serialize)]
struct ContainerStatus<'a> {
    name: &'a str,
    container_id: &'a str,
    image: &'a str,
    status: TaskStatus,
    last_status: TaskStatus,
    healthy: bool,
    message: &'a str,
    last_update_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<Resource>,
}

/// Pod status body for a task group
#[derive(Debug, Serialize)]
struct PodStatus<'a> {
    metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<DataKind>,
    status: TaskStatus,
    last_status: TaskStatus,
    host_ip: &'a str,
    host_name: &'a str,
    message: &'a str,
    start_time: DateTime<Utc>,
    last_update_time: DateTime<Utc>,
    report_time: DateTime<Utc>,
    container_statuses: Vec<ContainerStatus<'a>>,
}

impl StorageFormat for TaskGroup {
    fn to_storage_body(&self, report_time: DateTime<Utc>) -> SyncResult<serde_json::Value> {
        let mut metadata = self.object_meta.clone();
        metadata.name = self.id.clone();
        metadata.namespace = self.run_as.clone();

        let container_statuses = self
            .tasks
            .iter()
            .map(|task| ContainerStatus {
                name: &task.name,
                container_id: &task.id,
                image: &task.image,
                status: task.status,
                last_status: task.last_status,
                healthy: task.healthy,
                message: &task.message,
                last_update_time: timestamp(task.update_time),
                resources: task.resources,
            })
            .collect();

        let status = PodStatus {
            metadata,
            kind: self.kind,
            status: self.status,
            last_status: self.last_status,
            host_ip: self.host_ip(),
            host_name: &self.host_name,
            message: &self.message,
            start_time: timestamp(self.start_time),
            last_update_time: timestamp(self.last_update_time),
            report_time,
            container_statuses,
        };
        encode::<Self, _>(&status)
    }
}

impl StorageFormat for Deployment {
    fn to_storage_body(&self, _report_time: DateTime<Utc>) -> SyncResult<serde_json::Value> {
        let mut body = encode::<Self, _>(self)?;
        if let serde_json::Value::Object(map) = &mut body {
            map.insert(
                "is_in_rolling".to_string(),
                serde_json::Value::Bool(self.is_in_rolling()),
            );
        }
        Ok(body)
    }
}

macro_rules! verbatim_format {
    ($($ty:ty),+) => {
        $(
            impl StorageFormat for $ty {
                fn to_storage_body(&self, _report_time: DateTime<Utc>) -> SyncResult<serde_json::Value> {
                    encode::<Self, _>(self)
                }
            }
        )+
    };
}

verbatim_format!(Endpoint, ExportService, ConfigMap);
