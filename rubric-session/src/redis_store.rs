//! Redis-backed remote store (feature `redis-backend`).
//!
//! Each written path is one Redis string key holding the JSON-encoded value.
//! Reading a path with no key of its own collects every `path/*` key into a
//! JSON object, mirroring how the REST backend returns children.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::{Map, Value};

use crate::store::{insert_at, segments, RemoteStore, StoreError, StoreResult};

/// Default Redis URL when the store config does not name one.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

const SCAN_BATCH: usize = 200;

/// Redis implementation of [`RemoteStore`].
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own afterwards.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Check the connection with a PING.
    pub async fn is_healthy(&self) -> bool {
        let mut conn = self.conn.clone();
        matches!(
            redis::cmd("PING").query_async::<String>(&mut conn).await,
            Ok(ref pong) if pong == "PONG"
        )
    }

    fn key(path: &str) -> String {
        segments(path).join("/")
    }

    /// All keys strictly below `key`.
    async fn child_keys(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = if key.is_empty() {
            "*".to_string()
        } else {
            format!("{key}/*")
        };

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Request(e.to_string()))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

fn decode(raw: &str) -> StoreResult<Value> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl RemoteStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        let key = Self::key(path);
        let mut conn = self.conn.clone();

        if !key.is_empty() {
            let own: Option<String> = redis::cmd("GET")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Request(e.to_string()))?;
            if let Some(raw) = own {
                return decode(&raw).map(Some);
            }
        }

        let children = self.child_keys(&key).await?;
        if children.is_empty() {
            return Ok(None);
        }

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&children)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let prefix_len = if key.is_empty() { 0 } else { key.len() + 1 };
        let mut tree = Value::Object(Map::new());
        for (child, raw) in children.iter().zip(values) {
            // Key may have been deleted between SCAN and MGET
            let Some(raw) = raw else { continue };
            let relative = &child[prefix_len..];
            insert_at(&mut tree, &segments(relative), decode(&raw)?);
        }
        Ok(Some(tree))
    }

    async fn write(&self, path: &str, value: &Value) -> StoreResult<()> {
        let key = Self::key(path);
        if value.is_null() {
            return self.delete(&key).await;
        }

        let payload =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // A scalar replaces any subtree below the same path
        let stale = self.child_keys(&key).await?;
        let mut conn = self.conn.clone();
        if !stale.is_empty() {
            redis::cmd("DEL")
                .arg(&stale)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| StoreError::Request(e.to_string()))?;
        }

        redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        tracing::debug!(key = %key, "Value written to Redis");
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let key = Self::key(path);
        let mut keys = self.child_keys(&key).await?;
        if !key.is_empty() {
            keys.push(key);
        }
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(&keys)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// Redis Integration Tests (requires running Redis server)
// ============================================================================
