//! Error types for storage synchronization

use crate::models::EntityKind;
use thiserror::Error;

/// Result type alias for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by data operators, handlers and the dispatcher
#[derive(Debug, Error)]
pub enum SyncError {
    /// The storage service could not be reached or the request timed out
    #[error("storage request {method} {path} failed: {source}")]
    Transport {
        method: &'static str,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The storage service answered with a non-success status
    #[error("storage rejected {method} {path} with status {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },

    /// An entity could not be converted into its storage body
    #[error("failed to encode {kind} payload: {source}")]
    Encode {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to build storage client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// No handler exists for a kind the watch layer delivers
    #[error("no handler registered for kind {0}")]
    UnregisteredKind(EntityKind),

    #[error("handler for kind {0} registered twice")]
    DuplicateHandler(EntityKind),

    #[error("{handler} handler cannot process {object} objects")]
    KindMismatch {
        handler: EntityKind,
        object: EntityKind,
    },
}

impl SyncError {
    /// Whether the error came from talking to the storage service
    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::Status { .. })
    }

    /// Whether the error indicates a deployment/configuration mismatch
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::UnregisteredKind(_)
                | SyncError::DuplicateHandler(_)
                | SyncError::InvalidEndpoint(_)
        )
    }
}
