//! Durable key/value store for stream checkpoints and the dedupe set.

pub mod memory;
pub mod model;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::{create_pool, DbPool, SqliteStateStore};

use async_trait::async_trait;

use crate::core::domain::EventKey;
use crate::error::Result;

/// Durable checkpoint and dedupe storage, touched concurrently by both
/// source producers. `dedupe_mark_seen` must be atomic: exactly one caller
/// among any number racing on the same key observes `true`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn checkpoint_get(&self, stream: &str) -> Result<Option<String>>;
    async fn checkpoint_set(&self, stream: &str, value: &str) -> Result<()>;

    /// Inserts the fingerprint derived from `key` if absent. Returns `true`
    /// iff this call performed the insert.
    async fn dedupe_mark_seen(&self, key: &EventKey) -> Result<bool>;
    async fn dedupe_already_seen(&self, key: &EventKey) -> Result<bool>;
}
