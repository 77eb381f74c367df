//! In-process data operator
//!
//! Keeps nodes in a concurrent map with the update time the storage service
//! would record. Used by tests and by dry-run mode.

use super::operator::{BatchDeleteCondition, DataOperator};
use super::path::NodePath;
use crate::error::SyncResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A node as the storage service would hold it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub body: serde_json::Value,
    /// Epoch seconds of the last upsert
    pub update_time: i64,
}

/// Concurrent in-memory [`DataOperator`]
#[derive(Clone, Default)]
pub struct InMemoryOperator {
    nodes: Arc<DashMap<NodePath, StoredNode>>,
    requests: Arc<AtomicU64>,
}

impl InMemoryOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &NodePath) -> Option<StoredNode> {
        self.nodes.get(path).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of operator calls served so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Insert a node with an explicit update time
    pub fn upsert_at(&self, path: NodePath, body: serde_json::Value, update_time: i64) {
        self.nodes.insert(path, StoredNode { body, update_time });
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl DataOperator for InMemoryOperator {
    async fn create_node(&self, path: &NodePath, body: &serde_json::Value) -> SyncResult<()> {
        self.record_request();
        self.upsert_at(path.clone(), body.clone(), chrono::Utc::now().timestamp());
        debug!(path = %path, "Stored node in memory");
        Ok(())
    }

    async fn delete_node(&self, path: &NodePath) -> SyncResult<()> {
        self.record_request();
        self.nodes.remove(path);
        Ok(())
    }

    async fn delete_nodes_where(
        &self,
        scope: &NodePath,
        condition: &BatchDeleteCondition,
    ) -> SyncResult<()> {
        self.record_request();
        let before = self.nodes.len();
        self.nodes
            .retain(|path, node| !(path.is_within(scope) && condition.contains(node.update_time)));
        debug!(
            scope = %scope,
            removed = before.saturating_sub(self.nodes.len()),
            "Swept in-memory nodes"
        );
        Ok(())
    }
}
