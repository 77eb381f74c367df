//! Orchestrated entities mirrored into the storage service
//!
//! Every entity the watch layer reports is wrapped in a [`WatchObject`],
//! a tagged variant that carries its own [`EntityKind`]. Dispatch happens on
//! that tag, never on runtime type inspection.

mod application;
mod configmap;
mod deployment;
mod service;

pub use application::{
    AppStatus, AppSubStatus, Application, HealthCheckStatus, PodIndex, Task, TaskGroup,
    TaskStatus,
};
pub use configmap::{ConfigMap, ConfigMapItem, ConfigMapSourceType};
pub use deployment::{
    Deployment, DeploymentReferApplication, DeploymentStatus, RollingOperation, RollingUpdate,
    UpgradeStrategy,
};
pub use service::{ContainerEndpoint, Endpoint, EndpointPort, ExportBackend, ExportService};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Discriminator for every entity kind handled by this crate
///
/// The lowercase identifier doubles as the storage path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Application,
    TaskGroup,
    Deployment,
    Endpoint,
    ExportService,
    ConfigMap,
}

impl EntityKind {
    /// All kinds, in the order handlers are registered by default
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Application,
        EntityKind::TaskGroup,
        EntityKind::Deployment,
        EntityKind::Endpoint,
        EntityKind::ExportService,
        EntityKind::ConfigMap,
    ];

    /// Stable identifier used for registry lookup and storage paths
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Application => "application",
            EntityKind::TaskGroup => "taskgroup",
            EntityKind::Deployment => "deployment",
            EntityKind::Endpoint => "endpoint",
            EntityKind::ExportService => "exportservice",
            EntityKind::ConfigMap => "configmap",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type information carried by some entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMeta {
    #[serde(rename = "apiVersion", skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

/// Identity and labels shared by orchestrated objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// An entity that has a single, addressable storage identity
pub trait StorageObject: Send + Sync {
    /// Kind used for registry lookup and the path's kind segment
    const KIND: EntityKind;

    /// Namespace segment of the storage path
    fn namespace(&self) -> &str;

    /// Name segment of the storage path; unique within namespace and kind
    fn name(&self) -> &str;

    /// Borrow the entity out of a watch object of the matching kind
    fn from_object(object: &WatchObject) -> Option<&Self>;
}

/// Any entity delivered by the watch layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum WatchObject {
    Application(Box<Application>),
    TaskGroup(Box<TaskGroup>),
    Deployment(Box<Deployment>),
    Endpoint(Box<Endpoint>),
    ExportService(Box<ExportService>),
    ConfigMap(Box<ConfigMap>),
}

impl WatchObject {
    pub fn kind(&self) -> EntityKind {
        match self {
            WatchObject::Application(_) => EntityKind::Application,
            WatchObject::TaskGroup(_) => EntityKind::TaskGroup,
            WatchObject::Deployment(_) => EntityKind::Deployment,
            WatchObject::Endpoint(_) => EntityKind::Endpoint,
            WatchObject::ExportService(_) => EntityKind::ExportService,
            WatchObject::ConfigMap(_) => EntityKind::ConfigMap,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            WatchObject::Application(o) => o.namespace(),
            WatchObject::TaskGroup(o) => o.namespace(),
            WatchObject::Deployment(o) => o.namespace(),
            WatchObject::Endpoint(o) => o.namespace(),
            WatchObject::ExportService(o) => o.namespace(),
            WatchObject::ConfigMap(o) => o.namespace(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WatchObject::Application(o) => o.name(),
            WatchObject::TaskGroup(o) => o.name(),
            WatchObject::Deployment(o) => o.name(),
            WatchObject::Endpoint(o) => o.name(),
            WatchObject::ExportService(o) => o.name(),
            WatchObject::ConfigMap(o) => o.name(),
        }
    }
}

macro_rules! impl_watch_object {
    ($ty:ident, $variant:ident) => {
        impl From<$ty> for WatchObject {
            fn from(value: $ty) -> Self {
                WatchObject::$variant(Box::new(value))
            }
        }
    };
}

impl_watch_object!(Application, Application);
impl_watch_object!(TaskGroup, TaskGroup);
impl_watch_object!(Deployment, Deployment);
impl_watch_object!(Endpoint, Endpoint);
impl_watch_object!(ExportService, ExportService);
impl_watch_object!(ConfigMap, ConfigMap);

/// Operation reported by the watch layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchOperation {
    Add,
    Update,
    Delete,
}

impl WatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchOperation::Add => "add",
            WatchOperation::Update => "update",
            WatchOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for WatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One callback from the watch layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub operation: WatchOperation,
    pub object: WatchObject,
}

impl WatchEvent {
    pub fn new(operation: WatchOperation, object: impl Into<WatchObject>) -> Self {
        Self {
            operation,
            object: object.into(),
        }
    }

    pub fn add(object: impl Into<WatchObject>) -> Self {
        Self::new(WatchOperation::Add, object)
    }

    pub fn update(object: impl Into<WatchObject>) -> Self {
        Self::new(WatchOperation::Update, object)
    }

    pub fn delete(object: impl Into<WatchObject>) -> Self {
        Self::new(WatchOperation::Delete, object)
    }
}
