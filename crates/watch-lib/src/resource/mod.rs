//! Resource demand and placement constraints
//!
//! Pure value types and functions; nothing here performs I/O.

mod constraint;
mod version;

pub use constraint::{
    check_constraints, Constraint, ConstraintData, ConstraintDataItem, Range, Scalar, Text,
    ValueSet, ValueType,
};
pub use version::{
    lenient_parse_float, Container, DataKind, PortMapping, Process, ProcessResources, Resource,
    ResourceLimits, Version, CPUS_PER_EXECUTOR, CPUS_PER_TASK, DISK_PER_EXECUTOR, DISK_PER_TASK,
    MEM_PER_EXECUTOR, MEM_PER_TASK,
};
