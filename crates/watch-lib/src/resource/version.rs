//! Run specs and aggregate resource demand
//!
//! A [`Version`] holds either containers or processes, selected by its
//! [`DataKind`]. Aggregation only ever reads the active list.

use super::constraint::{check_constraints, Constraint};
use crate::models::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU reserved for the executor supervising a task group
pub const CPUS_PER_EXECUTOR: f64 = 0.01;
/// Default CPU for a task without an explicit request
pub const CPUS_PER_TASK: f64 = 1.0;
/// Memory (MB) reserved for the executor supervising a task group
pub const MEM_PER_EXECUTOR: f64 = 64.0;
/// Default memory (MB) for a task without an explicit request
pub const MEM_PER_TASK: f64 = 64.0;
/// Disk (MB) reserved for the executor supervising a task group
pub const DISK_PER_EXECUTOR: f64 = 64.0;
/// Default disk (MB) for a task without an explicit request
pub const DISK_PER_TASK: f64 = 64.0;

/// Whether a version runs containers or bare processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    #[serde(rename = "application")]
    Application,
    #[serde(rename = "process")]
    Process,
}

/// CPU, memory (MB) and disk (MB) demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
}

impl Resource {
    pub fn new(cpus: f64, mem: f64, disk: f64) -> Self {
        Self { cpus, mem, disk }
    }

    /// Request assigned to a task that declares none
    pub fn task_default() -> Self {
        Self::new(CPUS_PER_TASK, MEM_PER_TASK, DISK_PER_TASK)
    }
}

/// Parse a stored resource limit, treating anything unusable as zero
///
/// Process limits arrive as free-form strings. A malformed, non-finite or
/// negative value contributes nothing to aggregation instead of failing the
/// whole computation.
pub fn lenient_parse_float(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Limits of a process; an empty string means unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub cpu: String,
    pub mem: String,
    pub storage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessResources {
    pub limits: ResourceLimits,
}

/// A process run directly by the executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Process {
    pub proc_name: String,
    pub work_path: String,
    pub pid_file: String,
    pub start_cmd: String,
    pub stop_cmd: String,
    pub start_grace_period: u32,
    pub resources: ProcessResources,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMapping {
    pub name: String,
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

/// A container in an application version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    #[serde(rename = "type")]
    pub container_type: String,
    pub image: String,
    pub network: String,
    pub network_type: String,
    pub command: String,
    pub arguments: Vec<String>,
    pub port_mappings: Vec<PortMapping>,
    pub env: BTreeMap<String, String>,
    pub privileged: bool,
    /// Names of config maps mounted into the container
    pub config_maps: Vec<String>,
    pub resources: Option<Resource>,
    pub limit_resources: Option<Resource>,
}

/// Desired run spec of an application or process group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
    pub id: String,
    pub name: String,
    pub object_meta: ObjectMeta,
    pub instances: u32,
    pub run_as: String,
    pub kind: Option<DataKind>,
    pub containers: Vec<Container>,
    pub processes: Vec<Process>,
    pub labels: BTreeMap<String, String>,
    pub constraints: Option<Constraint>,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<serde_json::Value>,
}

impl Version {
    /// Kind used to pick the active list; unset means application
    pub fn effective_kind(&self) -> DataKind {
        self.kind.unwrap_or(DataKind::Application)
    }

    /// Fill in per-task defaults for anything that declares no resources
    ///
    /// Only the active list is touched. Calling this repeatedly has the same
    /// effect as calling it once.
    pub fn ensure_defaults(&mut self) {
        match self.effective_kind() {
            DataKind::Process => {
                for process in &mut self.processes {
                    let limits = &mut process.resources.limits;
                    if limits.cpu.is_empty() {
                        limits.cpu = CPUS_PER_TASK.to_string();
                    }
                    if limits.mem.is_empty() {
                        limits.mem = MEM_PER_TASK.to_string();
                    }
                    if limits.storage.is_empty() {
                        limits.storage = DISK_PER_TASK.to_string();
                    }
                }
            }
            DataKind::Application => {
                for container in &mut self.containers {
                    container.resources.get_or_insert_with(Resource::task_default);
                }
            }
        }
    }

    /// Total CPU requested by the active list
    pub fn all_cpus(&self) -> f64 {
        self.sum_active(|r| r.cpus, |l| &l.cpu)
    }

    /// Total memory requested by the active list plus executor overhead
    pub fn all_mems(&self) -> f64 {
        self.sum_active(|r| r.mem, |l| &l.mem) + MEM_PER_EXECUTOR
    }

    /// Total disk requested by the active list plus executor overhead
    pub fn all_disk(&self) -> f64 {
        self.sum_active(|r| r.disk, |l| &l.storage) + DISK_PER_EXECUTOR
    }

    pub fn all_resource(&self) -> Resource {
        Resource::new(self.all_cpus(), self.all_mems(), self.all_disk())
    }

    /// Structural validation of the placement constraint tree
    pub fn check_constraints(&self) -> bool {
        check_constraints(self.constraints.as_ref())
    }

    fn sum_active(
        &self,
        container_value: impl Fn(&Resource) -> f64,
        process_limit: impl Fn(&ResourceLimits) -> &String,
    ) -> f64 {
        match self.effective_kind() {
            DataKind::Process => self
                .processes
                .iter()
                .map(|p| lenient_parse_float(process_limit(&p.resources.limits)))
                .sum(),
            // A container that was never defaulted counts as the task default
            DataKind::Application => self
                .containers
                .iter()
                .map(|c| container_value(&c.resources.unwrap_or_else(Resource::task_default)))
                .sum(),
        }
    }
}
