//! Handler registry and event routing
//!
//! Handlers are registered on a [`RegistryBuilder`] during startup, then
//! frozen into a [`Dispatcher`] that is shared read-only between workers.

use super::handler::ResourceHandler;
use crate::error::{SyncError, SyncResult};
use crate::models::{EntityKind, WatchEvent, WatchOperation};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Collects handlers before the dispatcher is built
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<Arc<dyn ResourceHandler>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; a second handler for the same kind is rejected
    pub fn register(mut self, handler: Arc<dyn ResourceHandler>) -> SyncResult<Self> {
        let kind = handler.kind();
        if self.handlers.iter().any(|h| h.kind() == kind) {
            return Err(SyncError::DuplicateHandler(kind));
        }
        debug!(kind = %kind, "Registered storage handler");
        self.handlers.push(handler);
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        let index = self
            .handlers
            .iter()
            .enumerate()
            .map(|(i, handler)| (handler.kind(), i))
            .collect();

        Dispatcher {
            handlers: self.handlers,
            index,
        }
    }
}

/// Outcome of one sweep across every handler
#[derive(Debug, Default)]
pub struct SweepReport {
    pub succeeded: Vec<EntityKind>,
    pub failed: Vec<(EntityKind, SyncError)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Immutable kind-to-handler routing table
pub struct Dispatcher {
    handlers: Vec<Arc<dyn ResourceHandler>>,
    index: HashMap<EntityKind, usize>,
}

impl Dispatcher {
    pub fn handler(&self, kind: EntityKind) -> Option<&Arc<dyn ResourceHandler>> {
        self.index.get(&kind).map(|&i| &self.handlers[i])
    }

    /// Registered kinds, in registration order
    pub fn kinds(&self) -> Vec<EntityKind> {
        self.handlers.iter().map(|h| h.kind()).collect()
    }

    /// Fail if any of `kinds` has no handler
    pub fn ensure_registered(&self, kinds: &[EntityKind]) -> SyncResult<()> {
        match kinds.iter().find(|kind| !self.index.contains_key(*kind)) {
            Some(kind) => Err(SyncError::UnregisteredKind(*kind)),
            None => Ok(()),
        }
    }

    /// Route an event to its kind's handler
    pub async fn dispatch(&self, event: &WatchEvent) -> SyncResult<()> {
        let kind = event.object.kind();
        let handler = self
            .handler(kind)
            .ok_or(SyncError::UnregisteredKind(kind))?;

        match event.operation {
            WatchOperation::Add => handler.add(&event.object).await,
            WatchOperation::Update => handler.update(&event.object).await,
            WatchOperation::Delete => handler.delete(&event.object).await,
        }
    }

    /// Run every handler's sweep in registration order
    ///
    /// A failing handler does not stop the remaining ones.
    pub async fn check_dirty_all(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for handler in &self.handlers {
            let kind = handler.kind();
            match handler.check_dirty().await {
                Ok(()) => report.succeeded.push(kind),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Sweep failed");
                    report.failed.push((kind, e));
                }
            }
        }
        report
    }
}
