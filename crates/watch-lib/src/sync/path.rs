//! Storage node addressing
//!
//! Paths keep their segments apart so transports can encode each one; a name
//! containing `/` therefore never aliases another node.

use crate::models::EntityKind;
use std::fmt;

/// Leading segments shared by every node of the mesos storage tree
pub const STORAGE_ROOT: [&str; 3] = ["bcsstorage", "v1", "mesos"];

/// Address of a node, or of a scope of nodes, in the storage service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodePath {
    /// One entity: `.../dynamic/namespace_resources/clusters/{cluster}/namespaces/{ns}/{kind}/{name}`
    Namespaced {
        cluster: String,
        namespace: String,
        kind: EntityKind,
        name: String,
    },
    /// Every entity of a kind: `.../dynamic/all_resources/clusters/{cluster}/{kind}`
    AllResources { cluster: String, kind: EntityKind },
    /// Discovery projection: `.../watch/clusters/{cluster}/namespaces/{ns}/{kind}/{name}`
    Watch {
        cluster: String,
        namespace: String,
        kind: EntityKind,
        name: String,
    },
}

impl NodePath {
    pub fn namespaced(cluster: &str, namespace: &str, kind: EntityKind, name: &str) -> Self {
        NodePath::Namespaced {
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            kind,
            name: name.to_string(),
        }
    }

    pub fn all_resources(cluster: &str, kind: EntityKind) -> Self {
        NodePath::AllResources {
            cluster: cluster.to_string(),
            kind,
        }
    }

    pub fn watch(cluster: &str, namespace: &str, kind: EntityKind, name: &str) -> Self {
        NodePath::Watch {
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            kind,
            name: name.to_string(),
        }
    }

    pub fn cluster(&self) -> &str {
        match self {
            NodePath::Namespaced { cluster, .. }
            | NodePath::AllResources { cluster, .. }
            | NodePath::Watch { cluster, .. } => cluster,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            NodePath::Namespaced { kind, .. }
            | NodePath::AllResources { kind, .. }
            | NodePath::Watch { kind, .. } => *kind,
        }
    }

    /// Whether this path names a node the scope path covers
    ///
    /// Only dynamic namespace resources fall under an all-resources scope;
    /// watch projections are a separate tree.
    pub fn is_within(&self, scope: &NodePath) -> bool {
        match (self, scope) {
            (
                NodePath::Namespaced { cluster, kind, .. },
                NodePath::AllResources {
                    cluster: scope_cluster,
                    kind: scope_kind,
                },
            ) => cluster == scope_cluster && kind == scope_kind,
            _ => false,
        }
    }

    /// Unencoded path segments, root first
    pub fn segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = STORAGE_ROOT.to_vec();
        match self {
            NodePath::Namespaced {
                cluster,
                namespace,
                kind,
                name,
            } => segments.extend([
                "dynamic",
                "namespace_resources",
                "clusters",
                cluster.as_str(),
                "namespaces",
                namespace.as_str(),
                kind.as_str(),
                name.as_str(),
            ]),
            NodePath::AllResources { cluster, kind } => segments.extend([
                "dynamic",
                "all_resources",
                "clusters",
                cluster.as_str(),
                kind.as_str(),
            ]),
            NodePath::Watch {
                cluster,
                namespace,
                kind,
                name,
            } => segments.extend([
                "watch",
                "clusters",
                cluster.as_str(),
                "namespaces",
                namespace.as_str(),
                kind.as_str(),
                name.as_str(),
            ]),
        }
        segments
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments() {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
