//! Service reachability projections

use super::{EntityKind, ObjectMeta, StorageObject, TypeMeta, WatchObject};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPort {
    pub name: String,
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

/// Addresses of one container backing a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerEndpoint {
    pub container_id: String,
    pub node_ip: String,
    pub container_ip: String,
    pub network_mode: String,
    pub ports: Vec<EndpointPort>,
}

/// Reachability of the task groups selected by a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(rename = "metadata")]
    pub object_meta: ObjectMeta,
    #[serde(rename = "eps")]
    pub endpoints: Vec<ContainerEndpoint>,
}

impl StorageObject for Endpoint {
    const KIND: EntityKind = EntityKind::Endpoint;

    fn namespace(&self) -> &str {
        &self.object_meta.namespace
    }

    fn name(&self) -> &str {
        &self.object_meta.name
    }

    fn from_object(object: &WatchObject) -> Option<&Self> {
        match object {
            WatchObject::Endpoint(endpoint) => Some(endpoint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportBackend {
    pub target_ip: String,
    pub target_port: u16,
    pub weight: u32,
}

/// Exported-service metadata consumed by load balancers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportService {
    pub cluster: String,
    pub namespace: String,
    pub service_name: String,
    pub service_port: u16,
    pub protocol: String,
    pub bcs_group: Vec<String>,
    pub balance: String,
    pub max_conn: u32,
    pub service_weight: u32,
    pub backends: Vec<ExportBackend>,
}

impl StorageObject for ExportService {
    const KIND: EntityKind = EntityKind::ExportService;

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.service_name
    }

    fn from_object(object: &WatchObject) -> Option<&Self> {
        match object {
            WatchObject::ExportService(service) => Some(service),
            _ => None,
        }
    }
}
