//! Remote store abstraction.
//!
//! A remote store is a path-addressed JSON document store: `read`, `write`
//! and `delete` operate on slash-separated paths such as
//! `conversation/0001700000000000-000001`. Reading a path that has children
//! returns them as a JSON object keyed by the next path segment.
//!
//! Backends:
//!
//! - **REST**: realtime-database style HTTP API ([`RestStore`](crate::rest::RestStore))
//! - **Redis**: feature-gated behind `redis-backend`
//! - **Memory**: in-process, for local development and tests

use async_trait::async_trait;
use rubric_common::config::{RemoteStoreConfig, StoreBackend};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::memory::MemoryStore;
use crate::rest::RestStore;

/// Remote store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach or connect to the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request failed in transit (timeout, reset, TLS).
    #[error("Request error: {0}")]
    Request(String),

    /// Backend answered with a non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend is not available.
    #[error("Backend not available: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow interface to a durable key-value store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Backend name (e.g., "rest", "redis", "memory")
    fn name(&self) -> &str;

    /// Read the value at `path`. `None` when nothing is stored there.
    async fn read(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Overwrite the value at `path`.
    async fn write(&self, path: &str, value: &Value) -> StoreResult<()>;

    /// Delete the value at `path` and everything below it.
    ///
    /// Deleting a missing path is not an error.
    async fn delete(&self, path: &str) -> StoreResult<()>;
}

/// Split a store path into its non-empty segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Turn `value` into an object in place and return its map.
pub(crate) fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Insert `value` below `root` at the given segments, creating parents.
pub(crate) fn insert_at(root: &mut Value, segs: &[&str], value: Value) {
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for seg in parents {
        node = ensure_object(node)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.to_string(), value);
}

/// Create a store for the configured backend.
///
/// The redis backend falls back to an in-memory store when the crate is
/// built without `redis-backend`.
pub async fn create_store(config: &RemoteStoreConfig) -> StoreResult<Arc<dyn RemoteStore>> {
    match config.backend {
        StoreBackend::Rest => Ok(Arc::new(RestStore::new(config)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Redis => {
            #[cfg(feature = "redis-backend")]
            {
                let url = config
                    .redis_url
                    .clone()
                    .unwrap_or_else(|| crate::redis_store::DEFAULT_REDIS_URL.to_string());
                let store = crate::redis_store::RedisStore::connect(&url).await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "redis-backend"))]
            {
                tracing::warn!(
                    "Redis store requested but the redis-backend feature is not enabled. \
                     Falling back to in-memory store."
                );
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segments_skip_empty() {
        assert_eq!(segments("a//b/"), vec!["a", "b"]);
        assert!(segments("").is_empty());
        assert!(segments("/").is_empty());
    }

    #[test]
    fn test_insert_at_creates_parents() {
        let mut root = json!({});
        insert_at(&mut root, &["a", "b", "c"], json!(1));
        assert_eq!(root, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_insert_at_replaces_scalar_parent() {
        let mut root = json!({"a": "scalar"});
        insert_at(&mut root, &["a", "b"], json!(true));
        assert_eq!(root, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_insert_at_root() {
        let mut root = json!({"old": 1});
        insert_at(&mut root, &[], json!("new"));
        assert_eq!(root, json!("new"));
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let config = RemoteStoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store = create_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_create_rest_store() {
        let store = create_store(&RemoteStoreConfig::default()).await.unwrap();
        assert_eq!(store.name(), "rest");
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Status {
            status: 401,
            body: "Permission denied".into(),
        };
        assert_eq!(err.to_string(), "Unexpected status 401: Permission denied");
    }
}
