//! Rubric Session - conversation and summary state for the Rubric service.
//!
//! Session state lives in two places: an in-process cache that is always
//! available, and a remote key-value store that may not be. The remote is
//! reached through the narrow [`RemoteStore`] trait and wrapped by
//! [`ResilientStore`], which turns every failure into a logged fallback.
//!
//! ```text
//! SessionStore ──► LocalCache (RwLock)
//!      │
//!      └────────► ResilientStore ──► dyn RemoteStore
//!                                     ├─ RestStore
//!                                     ├─ RedisStore (redis-backend)
//!                                     └─ MemoryStore
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_store;
pub mod resilient;
pub mod rest;
pub mod session;
pub mod store;

pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
pub use resilient::{RemoteRead, ResilientStore};
pub use rest::RestStore;
pub use session::{MessageRecord, SessionStore, CONVERSATION_KEY, SUMMARY_KEY};
pub use store::{create_store, RemoteStore, StoreError, StoreResult};
