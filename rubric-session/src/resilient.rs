//! Best-effort wrapper around a remote store.
//!
//! [`ResilientStore`] never returns an error. Every failure of the wrapped
//! store is logged at `warn`, counted, and reported to the caller as a plain
//! outcome so it can fall back to its local copy.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::store::RemoteStore;

/// Outcome of a best-effort read.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRead {
    /// The store answered with a value.
    Found(Value),
    /// The store answered; nothing is stored at the path.
    Missing,
    /// The store could not be read. Use the local copy.
    Failed,
}

/// Error-swallowing decorator for a [`RemoteStore`].
pub struct ResilientStore {
    inner: Arc<dyn RemoteStore>,
    failures: AtomicU64,
}

impl ResilientStore {
    /// Wrap a store.
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            failures: AtomicU64::new(0),
        }
    }

    /// Name of the wrapped backend.
    pub fn backend(&self) -> &str {
        self.inner.name()
    }

    /// Number of swallowed failures since creation.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record_failure(&self, operation: &str, path: &str, error: &dyn std::fmt::Display) {
        let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            backend = self.inner.name(),
            operation = operation,
            path = path,
            error = %error,
            failures = total,
            "Remote store call failed, continuing with local state"
        );
    }

    pub async fn read(&self, path: &str) -> RemoteRead {
        match self.inner.read(path).await {
            Ok(Some(value)) => RemoteRead::Found(value),
            Ok(None) => RemoteRead::Missing,
            Err(e) => {
                self.record_failure("read", path, &e);
                RemoteRead::Failed
            }
        }
    }

    /// Returns `true` when the value reached the store.
    pub async fn write(&self, path: &str, value: &Value) -> bool {
        match self.inner.write(path, value).await {
            Ok(()) => true,
            Err(e) => {
                self.record_failure("write", path, &e);
                false
            }
        }
    }

    /// Returns `true` when the store acknowledged the delete.
    pub async fn delete(&self, path: &str) -> bool {
        match self.inner.delete(path).await {
            Ok(()) => true,
            Err(e) => {
                self.record_failure("delete", path, &e);
                false
            }
        }
    }
}
