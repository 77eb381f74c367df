//! Deployments and rolling-update strategy

use super::{EntityKind, ObjectMeta, StorageObject, WatchObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    #[default]
    Deploying,
    Running,
    Update,
    UpdatePaused,
    UpdateSuspend,
    Deleting,
}

impl DeploymentStatus {
    /// Whether a rolling update is in progress, paused or suspended
    pub fn is_rolling(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Update
                | DeploymentStatus::UpdatePaused
                | DeploymentStatus::UpdateSuspend
        )
    }
}

/// Pending operation on a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollingOperation {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "START")]
    Start,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingUpdate {
    pub update_delay: u32,
    pub max_unavailable: u32,
    pub max_surge: u32,
    pub upgrade_type: String,
    pub rolling_manually: bool,
    pub rolling_order: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeStrategy {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(rename = "rollingupdate", skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdate>,
}

/// Application a deployment currently drives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentReferApplication {
    pub name: String,
    pub curr_target_instances: u32,
    pub curr_rolling_instances: u32,
}

/// Rolling-update controller for an application
///
/// `is_in_rolling` is not stored: it is derived from `status` so the two
/// cannot disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    #[serde(rename = "metadata")]
    pub object_meta: ObjectMeta,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    pub strategy: UpgradeStrategy,
    pub status: DeploymentStatus,
    pub application: Option<DeploymentReferApplication>,
    /// Replacement application during a rolling update
    pub application_ext: Option<DeploymentReferApplication>,
    pub last_rolling_time: i64,
    #[serde(rename = "curr_rolling_operation")]
    pub curr_rolling_op: RollingOperation,
    pub check_time: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json_backup: Option<serde_json::Value>,
}

impl Deployment {
    pub fn is_in_rolling(&self) -> bool {
        self.status.is_rolling()
    }
}

impl StorageObject for Deployment {
    const KIND: EntityKind = EntityKind::Deployment;

    fn namespace(&self) -> &str {
        &self.object_meta.namespace
    }

    fn name(&self) -> &str {
        &self.object_meta.name
    }

    fn from_object(object: &WatchObject) -> Option<&Self> {
        match object {
            WatchObject::Deployment(deployment) => Some(deployment),
            _ => None,
        }
    }
}
