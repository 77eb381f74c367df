//! Storage service client
//!
//! [`DataOperator`] is the only seam that performs network I/O. The HTTP
//! implementation issues exactly one request per call and never retries;
//! convergence comes from the next watch event or the next sweep.

use super::path::NodePath;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Update-time window selecting nodes for a conditional batch delete
///
/// Covers `[update_time_begin, update_time_end)` in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteCondition {
    pub update_time_begin: i64,
    pub update_time_end: i64,
}

impl BatchDeleteCondition {
    /// Everything not updated within `threshold` of `now`
    pub fn older_than(now: i64, threshold: Duration) -> Self {
        let threshold = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
        Self {
            update_time_begin: 0,
            update_time_end: now.saturating_sub(threshold),
        }
    }

    pub fn contains(&self, update_time: i64) -> bool {
        update_time >= self.update_time_begin && update_time < self.update_time_end
    }
}

/// Node operations against the storage service
#[async_trait]
pub trait DataOperator: Send + Sync {
    /// Create or replace the node at `path`
    async fn create_node(&self, path: &NodePath, body: &serde_json::Value) -> SyncResult<()>;

    /// Delete the node at `path`; an absent node is not an error
    async fn delete_node(&self, path: &NodePath) -> SyncResult<()>;

    /// Delete every node under `scope` whose update time is inside `condition`
    async fn delete_nodes_where(
        &self,
        scope: &NodePath,
        condition: &BatchDeleteCondition,
    ) -> SyncResult<()>;
}

/// Configuration for the HTTP storage client
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Storage service base URL (e.g., "http://bcs-storage:50024")
    pub endpoint: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://bcs-storage:50024".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Upsert envelope expected by the dynamic storage API
#[derive(Serialize)]
struct DynamicBody<'a> {
    data: &'a serde_json::Value,
}

/// [`DataOperator`] backed by the storage service's REST API
pub struct HttpDataOperator {
    client: Client,
    base_url: Url,
    config: OperatorConfig,
}

impl HttpDataOperator {
    pub fn new(config: OperatorConfig) -> SyncResult<Self> {
        let base_url = Url::parse(&config.endpoint)
            .map_err(|e| SyncError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidEndpoint(config.endpoint.clone()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(SyncError::ClientBuild)?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Full URL of a node, each path segment percent-encoded on its own
    fn url_for(&self, path: &NodePath) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidEndpoint(self.config.endpoint.clone()))?
            .pop_if_empty()
            .extend(path.segments());
        Ok(url)
    }

    async fn send(
        &self,
        method: &'static str,
        path: &NodePath,
        request: RequestBuilder,
        tolerate_missing: bool,
    ) -> SyncResult<()> {
        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|source| SyncError::Transport {
                method,
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() || (tolerate_missing && status == StatusCode::NOT_FOUND) {
            debug!(
                method,
                path = %path,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis(),
                "Storage request complete"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Status {
            method,
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DataOperator for HttpDataOperator {
    async fn create_node(&self, path: &NodePath, body: &serde_json::Value) -> SyncResult<()> {
        let request = self
            .client
            .put(self.url_for(path)?)
            .json(&DynamicBody { data: body });
        self.send("PUT", path, request, false).await
    }

    async fn delete_node(&self, path: &NodePath) -> SyncResult<()> {
        let request = self.client.delete(self.url_for(path)?);
        self.send("DELETE", path, request, true).await
    }

    async fn delete_nodes_where(
        &self,
        scope: &NodePath,
        condition: &BatchDeleteCondition,
    ) -> SyncResult<()> {
        let request = self.client.delete(self.url_for(scope)?).json(condition);
        // An empty match set may be reported as 404
        self.send("DELETE", scope, request, true).await
    }
}

/// Builder for [`HttpDataOperator`]
pub struct HttpDataOperatorBuilder {
    config: OperatorConfig,
}

impl HttpDataOperatorBuilder {
    pub fn new() -> Self {
        Self {
            config: OperatorConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> SyncResult<HttpDataOperator> {
        HttpDataOperator::new(self.config)
    }
}

impl Default for HttpDataOperatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
