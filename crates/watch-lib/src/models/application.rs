//! Applications, task groups and tasks

use super::{EntityKind, ObjectMeta, StorageObject, WatchObject};
use crate::resource::{DataKind, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of an application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppStatus {
    Staging,
    Deploying,
    Running,
    Finish,
    Error,
    Operating,
    RollingUpdate,
    #[default]
    Unknown,
    Abnormal,
}

/// Finer-grained status during a rolling update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppSubStatus {
    #[default]
    Unknown,
    RollingUpdateDown,
    RollingUpdateUp,
}

/// Status shared by tasks and task groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Staging,
    Starting,
    Running,
    Finish,
    Error,
    Killing,
    Killed,
    Failed,
    Lost,
    Restarting,
    #[default]
    Unknown,
}

impl TaskStatus {
    /// Terminal states after which the task group is removed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finish
                | TaskStatus::Error
                | TaskStatus::Killed
                | TaskStatus::Failed
                | TaskStatus::Lost
        )
    }
}

/// Reference from an application to one of its task groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodIndex {
    pub name: String,
}

/// Replica set running a fixed number of task groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    pub kind: Option<DataKind>,
    pub id: String,
    pub name: String,
    pub object_meta: ObjectMeta,
    pub define_instances: u64,
    pub instances: u64,
    pub running_instances: u64,
    pub run_as: String,
    pub cluster_id: String,
    pub status: AppStatus,
    pub sub_status: AppSubStatus,
    pub last_status: AppStatus,
    /// Epoch seconds
    pub created: i64,
    /// Epoch seconds
    pub update_time: i64,
    pub mode: String,
    /// Epoch seconds
    pub last_update_time: i64,
    pub message: String,
    pub pods: Vec<PodIndex>,
    /// Verbatim copy of the submitted spec, used for reconstitution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<serde_json::Value>,
}

impl StorageObject for Application {
    const KIND: EntityKind = EntityKind::Application;

    fn namespace(&self) -> &str {
        &self.run_as
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn from_object(object: &WatchObject) -> Option<&Self> {
        match object {
            WatchObject::Application(app) => Some(app),
            _ => None,
        }
    }
}

/// Result of one health check against a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckStatus {
    #[serde(rename = "type")]
    pub check_type: String,
    pub result: bool,
    pub message: String,
}

/// A single executable unit inside a task group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub kind: Option<DataKind>,
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub network: String,
    pub network_type: String,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub resources: Option<Resource>,
    pub health_check_status: Vec<HealthCheckStatus>,
    pub healthy: bool,
    pub is_checked: bool,
    pub consecutive_failure_times: u32,
    pub agent_id: String,
    pub agent_hostname: String,
    pub agent_ip_address: String,
    pub status: TaskStatus,
    pub last_status: TaskStatus,
    /// Epoch seconds
    pub update_time: i64,
    pub status_data: String,
    pub app_id: String,
    pub run_as: String,
    /// Epoch seconds
    pub last_update_time: i64,
    pub message: String,
}

/// Tasks placed together on one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskGroup {
    pub kind: Option<DataKind>,
    pub id: String,
    pub name: String,
    pub app_id: String,
    pub run_as: String,
    pub object_meta: ObjectMeta,
    pub agent_id: String,
    pub executor_id: String,
    pub status: TaskStatus,
    pub last_status: TaskStatus,
    pub instance_id: u64,
    pub tasks: Vec<Task>,
    pub version_name: String,
    /// Epoch seconds
    pub last_update_time: i64,
    /// Epoch seconds
    pub start_time: i64,
    /// Epoch seconds
    pub update_time: i64,
    pub resched_times: u32,
    /// Epoch seconds
    pub last_resched_time: i64,
    pub host_name: String,
    pub message: String,
    pub launch_resource: Option<Resource>,
    pub curr_resource: Option<Resource>,
}

impl TaskGroup {
    /// Address of the agent the group runs on, taken from its first task
    pub fn host_ip(&self) -> &str {
        self.tasks
            .first()
            .map(|t| t.agent_ip_address.as_str())
            .unwrap_or_default()
    }
}

impl StorageObject for TaskGroup {
    const KIND: EntityKind = EntityKind::TaskGroup;

    fn namespace(&self) -> &str {
        &self.run_as
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn from_object(object: &WatchObject) -> Option<&Self> {
        match object {
            WatchObject::TaskGroup(group) => Some(group),
            _ => None,
        }
    }
}
