//! Session state mirrored between a local cache and a remote store.
//!
//! [`SessionStore`] holds the conversation log and the background summary.
//! Writes always land in the local cache first and are then pushed to the
//! remote store on a best-effort basis. Reads prefer the remote copy and fall
//! back to the local cache when the remote cannot be reached. No operation
//! can fail.
//!
//! # Remote layout
//!
//! ```text
//! {prefix}conversation/
//!     {sent_at:013}-{seq:06} -> {"seq": 0, "sent_at": 1700000000000, "text": "..."}
//!     ...
//! {prefix}background_summary -> "..."
//! ```
//!
//! Conversation entries carry their own `(sent_at, seq)` order so the log
//! order survives stores that return children in arbitrary key order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::resilient::{RemoteRead, ResilientStore};
use crate::store::RemoteStore;

/// Remote key of the conversation log.
pub const CONVERSATION_KEY: &str = "conversation";

/// Remote key of the background summary.
pub const SUMMARY_KEY: &str = "background_summary";

/// One conversation entry as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Per-process sequence number, breaks ties within a millisecond.
    pub seq: u64,
    /// Unix timestamp in milliseconds, non-decreasing within one process.
    pub sent_at: i64,
    pub text: String,
}

impl MessageRecord {
    /// Child key under the conversation path. Sorts chronologically.
    pub fn key(&self) -> String {
        format!("{:013}-{:06}", self.sent_at, self.seq)
    }

    fn order(&self) -> (i64, u64) {
        (self.sent_at, self.seq)
    }
}

/// Decode the remote conversation object into ordered texts.
///
/// Returns `None` when the value is not an object. Entries written as bare
/// strings (before records carried an order) sort first, by key. Entries
/// that are neither are skipped.
fn decode_log(value: &Value) -> Option<Vec<String>> {
    let entries = value.as_object()?;

    let mut ordered: Vec<((i64, u64), &str, String)> = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        if let Some(text) = entry.as_str() {
            ordered.push(((i64::MIN, 0), key.as_str(), text.to_string()));
            continue;
        }
        match serde_json::from_value::<MessageRecord>(entry.clone()) {
            Ok(record) => ordered.push((record.order(), key.as_str(), record.text)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping malformed conversation entry");
            }
        }
    }

    ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    Some(ordered.into_iter().map(|(_, _, text)| text).collect())
}

#[derive(Debug, Default)]
struct LocalCache {
    messages: Vec<MessageRecord>,
    summary: String,
    next_seq: u64,
    last_sent_at: i64,
}

impl LocalCache {
    /// Append a record stamped `now_millis`, clamped so timestamps never go
    /// backwards within this process. `(sent_at, seq)` order then matches
    /// append order even if the wall clock steps back.
    fn push_message(&mut self, now_millis: i64, text: String) -> MessageRecord {
        let sent_at = now_millis.max(self.last_sent_at);
        let record = MessageRecord {
            seq: self.next_seq,
            sent_at,
            text,
        };

        self.next_seq += 1;
        self.last_sent_at = sent_at;
        self.messages.push(record.clone());
        record
    }
}

/// Conversation log and background summary with local + remote copies.
pub struct SessionStore {
    local: RwLock<LocalCache>,
    remote: ResilientStore,
    conversation_path: String,
    summary_path: String,
}

impl SessionStore {
    /// Create a session store over `remote`, with keys namespaced by `key_prefix`.
    pub fn new(remote: Arc<dyn RemoteStore>, key_prefix: &str) -> Self {
        Self {
            local: RwLock::new(LocalCache::default()),
            remote: ResilientStore::new(remote),
            conversation_path: format!("{key_prefix}{CONVERSATION_KEY}"),
            summary_path: format!("{key_prefix}{SUMMARY_KEY}"),
        }
    }

    /// Name of the remote backend.
    pub fn backend(&self) -> &str {
        self.remote.backend()
    }

    /// Number of remote failures swallowed so far.
    pub fn remote_failures(&self) -> u64 {
        self.remote.failures()
    }

    /// Append a chat message.
    ///
    /// The local log always grows. If the remote write fails the two copies
    /// diverge until the next [`reset`](Self::reset).
    pub async fn append_message(&self, text: impl Into<String>) {
        let record = {
            let mut local = self.local.write().await;
            local.push_message(chrono::Utc::now().timestamp_millis(), text.into())
        };

        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode conversation entry");
                return;
            }
        };

        let path = format!("{}/{}", self.conversation_path, record.key());
        if self.remote.write(&path, &value).await {
            tracing::debug!(seq = record.seq, "Conversation entry stored remotely");
        }
    }

    /// Read the conversation log, oldest first.
    ///
    /// A reachable remote is authoritative, even when it holds fewer entries
    /// than the local cache. An unreachable or unreadable remote yields the
    /// local cache.
    pub async fn read_messages(&self) -> Vec<String> {
        match self.remote.read(&self.conversation_path).await {
            RemoteRead::Found(value) => match decode_log(&value) {
                Some(messages) => messages,
                None => {
                    tracing::warn!("Remote conversation is not an object, using local log");
                    self.local_messages().await
                }
            },
            RemoteRead::Missing => Vec::new(),
            RemoteRead::Failed => self.local_messages().await,
        }
    }

    async fn local_messages(&self) -> Vec<String> {
        let local = self.local.read().await;
        local.messages.iter().map(|m| m.text.clone()).collect()
    }

    /// Replace the background summary.
    pub async fn set_summary(&self, value: impl Into<String>) {
        let value = value.into();
        {
            let mut local = self.local.write().await;
            local.summary = value.clone();
        }

        self.remote
            .write(&self.summary_path, &Value::String(value))
            .await;
    }

    /// Current background summary, or an empty string when unset.
    ///
    /// A non-empty local value wins. Otherwise the remote value is fetched
    /// and cached locally.
    pub async fn get_summary(&self) -> String {
        {
            let local = self.local.read().await;
            if !local.summary.is_empty() {
                return local.summary.clone();
            }
        }

        let remote = match self.remote.read(&self.summary_path).await {
            RemoteRead::Found(Value::String(s)) if !s.is_empty() => s,
            RemoteRead::Found(other) if !other.is_string() => {
                tracing::warn!("Remote background summary is not a string, ignoring");
                return String::new();
            }
            _ => return String::new(),
        };

        let mut local = self.local.write().await;
        // A concurrent set_summary wins over the value we fetched
        if local.summary.is_empty() {
            local.summary = remote;
        }
        local.summary.clone()
    }

    /// Clear the log and the summary, locally and remotely.
    pub async fn reset(&self) {
        {
            let mut local = self.local.write().await;
            local.messages.clear();
            local.summary.clear();
        }

        self.remote.delete(&self.conversation_path).await;
        self.remote.delete(&self.summary_path).await;
        tracing::info!(backend = self.backend(), "Session state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn store() -> (SessionStore, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        (SessionStore::new(memory.clone(), ""), memory)
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut cache = LocalCache::default();
        let first = cache.push_message(5_000, "first".into());
        // Clock stepped back between appends
        let second = cache.push_message(1_000, "second".into());
        let third = cache.push_message(6_000, "third".into());

        assert_eq!(second.sent_at, 5_000);
        assert!(first.key() < second.key());
        assert!(second.key() < third.key());

        let log: serde_json::Map<String, Value> = [third, first, second]
            .into_iter()
            .map(|r| (r.key(), serde_json::to_value(&r).unwrap()))
            .collect();
        assert_eq!(
            decode_log(&Value::Object(log)).unwrap(),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_record_key_sorts_chronologically() {
        let a = MessageRecord {
            seq: 7,
            sent_at: 999,
            text: "a".into(),
        };
        let b = MessageRecord {
            seq: 1,
            sent_at: 1_000,
            text: "b".into(),
        };
        assert_eq!(a.key(), "0000000000999-000007");
        assert!(a.key() < b.key());
    }

    #[test]
    fn test_decode_log_orders_by_record_not_key() {
        let value = json!({
            "a": {"seq": 2, "sent_at": 20, "text": "third"},
            "b": {"seq": 0, "sent_at": 10, "text": "first"},
            "c": {"seq": 1, "sent_at": 10, "text": "second"},
        });
        assert_eq!(
            decode_log(&value).unwrap(),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_decode_log_legacy_and_malformed_entries() {
        let value = json!({
            "-Nb2": "legacy two",
            "-Nb1": "legacy one",
            "0000000000010-000000": {"seq": 0, "sent_at": 10, "text": "new"},
            "junk": {"unexpected": true},
        });
        assert_eq!(
            decode_log(&value).unwrap(),
            vec!["legacy one", "legacy two", "new"]
        );
        assert!(decode_log(&json!("not a map")).is_none());
    }

    #[tokio::test]
    async fn test_append_then_read_remote_reachable() {
        let (session, memory) = store();
        session.append_message("Plan a lesson").await;
        session.append_message("Add a quiz").await;

        assert_eq!(
            session.read_messages().await,
            vec!["Plan a lesson", "Add a quiz"]
        );
        let snapshot = memory.snapshot().await;
        assert_eq!(snapshot[CONVERSATION_KEY].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_then_read_remote_unreachable() {
        let (session, memory) = store();
        memory.set_online(false);

        session.append_message("Plan a lesson").await;
        assert_eq!(session.read_messages().await, vec!["Plan a lesson"]);
        assert_eq!(session.remote_failures(), 2);
    }

    #[tokio::test]
    async fn test_reachable_remote_is_authoritative() {
        let (session, memory) = store();
        memory.set_online(false);
        session.append_message("lost remotely").await;
        memory.set_online(true);
        session.append_message("stored remotely").await;

        // The remote view misses the entry written during the outage
        assert_eq!(session.read_messages().await, vec!["stored remotely"]);
    }

    #[tokio::test]
    async fn test_read_shares_remote_log_across_instances() {
        let memory = Arc::new(MemoryStore::new());
        let first = SessionStore::new(memory.clone(), "");
        first.append_message("from first").await;

        let second = SessionStore::new(memory.clone(), "");
        assert_eq!(second.read_messages().await, vec!["from first"]);
    }

    #[tokio::test]
    async fn test_malformed_remote_log_falls_back_to_local() {
        let (session, memory) = store();
        session.append_message("local copy").await;
        memory
            .write(CONVERSATION_KEY, &json!("garbage"))
            .await
            .unwrap();

        assert_eq!(session.read_messages().await, vec!["local copy"]);
    }

    #[tokio::test]
    async fn test_set_then_get_summary_independent_of_remote() {
        let (session, memory) = store();
        session.set_summary("hello world foo bar").await;
        assert_eq!(session.get_summary().await, "hello world foo bar");

        memory.set_online(false);
        session.set_summary("offline summary").await;
        assert_eq!(session.get_summary().await, "offline summary");
    }

    #[tokio::test]
    async fn test_get_summary_populates_from_remote() {
        let memory = Arc::new(MemoryStore::new());
        memory
            .write(SUMMARY_KEY, &json!("from a previous run"))
            .await
            .unwrap();

        let session = SessionStore::new(memory.clone(), "");
        assert_eq!(session.get_summary().await, "from a previous run");

        // Cached locally now
        memory.set_online(false);
        assert_eq!(session.get_summary().await, "from a previous run");
    }

    #[tokio::test]
    async fn test_get_summary_empty_when_unset_or_unreachable() {
        let (session, memory) = store();
        assert_eq!(session.get_summary().await, "");

        memory.set_online(false);
        assert_eq!(session.get_summary().await, "");
    }

    #[tokio::test]
    async fn test_get_summary_ignores_non_string_remote() {
        let (session, memory) = store();
        memory.write(SUMMARY_KEY, &json!(42)).await.unwrap();
        assert_eq!(session.get_summary().await, "");
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (session, memory) = store();
        session.append_message("one").await;
        session.set_summary("summary").await;

        session.reset().await;
        assert!(session.read_messages().await.is_empty());
        assert_eq!(session.get_summary().await, "");
        assert_eq!(memory.snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_reset_with_remote_unreachable() {
        let (session, memory) = store();
        session.append_message("one").await;
        session.set_summary("summary").await;

        memory.set_online(false);
        session.reset().await;
        assert!(session.read_messages().await.is_empty());
        assert_eq!(session.get_summary().await, "");
    }

    #[tokio::test]
    async fn test_key_prefix_namespaces_remote_keys() {
        let memory = Arc::new(MemoryStore::new());
        let session = SessionStore::new(memory.clone(), "classroom-a/");
        session.set_summary("prefixed").await;
        session.append_message("hi").await;

        let snapshot = memory.snapshot().await;
        assert_eq!(snapshot["classroom-a"][SUMMARY_KEY], "prefixed");
        assert!(snapshot["classroom-a"][CONVERSATION_KEY].is_object());
        assert!(snapshot.get(SUMMARY_KEY).is_none());
    }
}
