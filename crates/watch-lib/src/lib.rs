//! Cluster-state storage sync for mesos clusters
//!
//! This crate provides the core functionality for:
//! - Mirroring scheduler entities into the storage service
//! - Resource demand aggregation and defaulting
//! - Placement constraint validation
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod resource;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StructuredLogger, SyncMetrics};
