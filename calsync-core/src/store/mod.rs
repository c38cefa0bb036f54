//! Persistence for timelines and sync cursors.
//!
//! A `Store` is a small async key/value interface over JSON values. Three
//! implementations share it: `InMemoryStore` (nothing persisted),
//! `LocalStore` (one JSON document on disk) and `ScopedStore`, which wraps
//! another store and confines every operation to one key prefix so several
//! calendars can share a backing store.

mod local;
mod memory;
mod scoped;

pub use local::LocalStore;
pub use memory::InMemoryStore;
pub use scoped::ScopedStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CalSyncResult;

#[async_trait]
pub trait Store: Send + Sync {
    async fn read(&self, key: &str) -> CalSyncResult<Option<Value>>;

    async fn write(&self, key: &str, value: Value) -> CalSyncResult<()>;

    async fn remove(&self, key: &str) -> CalSyncResult<()>;

    /// Every key currently present.
    async fn keys(&self) -> CalSyncResult<Vec<String>>;
}
