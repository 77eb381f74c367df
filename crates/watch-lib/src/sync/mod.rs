//! Storage synchronization
//!
//! This module provides:
//! - Storage node paths and the data operator seam (HTTP and in-memory)
//! - Per-kind handlers converting watch callbacks into node writes
//! - The handler registry and dispatcher
//! - Sharded event processing and periodic stale-node sweeps

mod convert;
mod dispatcher;
mod handler;
mod memory;
mod operator;
mod path;
mod workers;

#[cfg(test)]
mod tests;

pub use convert::StorageFormat;
pub use dispatcher::{Dispatcher, RegistryBuilder, SweepReport};
pub use handler::{
    ExportServiceHandler, MirrorHandler, ResourceHandler, SweepPolicy, DEFAULT_STALE_THRESHOLD,
};
pub use memory::{InMemoryOperator, StoredNode};
pub use operator::{
    BatchDeleteCondition, DataOperator, HttpDataOperator, HttpDataOperatorBuilder, OperatorConfig,
};
pub use path::{NodePath, STORAGE_ROOT};
pub use workers::{EventLoop, EventLoopClosed, EventLoopConfig, EventSender, SweepLoop};
