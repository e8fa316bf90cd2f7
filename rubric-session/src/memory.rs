//! In-process remote store.
//!
//! Used when no durable backend is configured, and as the injectable fake in
//! tests: [`MemoryStore::set_online`] simulates an outage, after which every
//! operation fails with [`StoreError::Unavailable`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::store::{insert_at, segments, RemoteStore, StoreError, StoreResult};

/// In-memory JSON tree implementing [`RemoteStore`].
#[derive(Debug)]
pub struct MemoryStore {
    root: RwLock<Value>,
    online: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Toggle simulated availability.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of operations attempted, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Clone of the whole tree, bypassing availability.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    fn check_online(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        self.check_online()?;

        let root = self.root.read().await;
        let mut node = &*root;
        for seg in segments(path) {
            match node.get(seg) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }

        match node {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            other => Ok(Some(other.clone())),
        }
    }

    async fn write(&self, path: &str, value: &Value) -> StoreResult<()> {
        if value.is_null() {
            return self.delete(path).await;
        }
        self.check_online()?;

        let mut root = self.root.write().await;
        insert_at(&mut root, &segments(path), value.clone());
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.check_online()?;

        let segs = segments(path);
        let mut root = self.root.write().await;
        let Some((last, parents)) = segs.split_last() else {
            *root = Value::Object(Map::new());
            return Ok(());
        };

        let mut node = &mut *root;
        for seg in parents {
            match node.get_mut(*seg) {
                Some(child) => node = child,
                None => return Ok(()),
            }
        }
        if let Value::Object(map) = node {
            map.remove(*last);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryStore::new();
        store.write("background_summary", &json!("hello")).await.unwrap();
        assert_eq!(
            store.read("background_summary").await.unwrap(),
            Some(json!("hello"))
        );
    }

    #[tokio::test]
    async fn test_read_parent_returns_children() {
        let store = MemoryStore::new();
        store.write("conversation/a", &json!({"text": "one"})).await.unwrap();
        store.write("conversation/b", &json!({"text": "two"})).await.unwrap();

        let value = store.read("conversation").await.unwrap().unwrap();
        assert_eq!(value["a"]["text"], "one");
        assert_eq!(value["b"]["text"], "two");
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read("nothing/here").await.unwrap(), None);
        assert_eq!(store.read("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_subtree() {
        let store = MemoryStore::new();
        store.write("conversation/a", &json!("x")).await.unwrap();
        store.write("background_summary", &json!("s")).await.unwrap();

        store.delete("conversation").await.unwrap();
        assert_eq!(store.read("conversation").await.unwrap(), None);
        assert_eq!(
            store.read("background_summary").await.unwrap(),
            Some(json!("s"))
        );

        // Missing paths are fine
        store.delete("conversation/zzz").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_null_deletes() {
        let store = MemoryStore::new();
        store.write("k", &json!(1)).await.unwrap();
        store.write("k", &Value::Null).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_fails_every_operation() {
        let store = MemoryStore::new();
        store.write("k", &json!(1)).await.unwrap();
        store.set_online(false);

        assert!(matches!(
            store.read("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.write("k", &json!(2)).await.is_err());
        assert!(store.delete("k").await.is_err());
        assert_eq!(store.calls(), 4);

        // Data survives the outage
        store.set_online(true);
        assert_eq!(store.read("k").await.unwrap(), Some(json!(1)));
        assert_eq!(store.snapshot().await, json!({"k": 1}));
    }
}
