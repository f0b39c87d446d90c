//! In-memory `StateStore`, used by pipeline unit tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::StateStore;
use crate::core::domain::{build_dedupe_key, EventKey};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    checkpoints: RwLock<HashMap<String, String>>,
    dedupe: RwLock<HashSet<String>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn checkpoint_get(&self, stream: &str) -> Result<Option<String>> {
        Ok(self.checkpoints.read().get(stream).cloned())
    }

    async fn checkpoint_set(&self, stream: &str, value: &str) -> Result<()> {
        self.checkpoints
            .write()
            .insert(stream.to_string(), value.to_string());
        Ok(())
    }

    async fn dedupe_mark_seen(&self, key: &EventKey) -> Result<bool> {
        let fingerprint = build_dedupe_key(key).as_str().to_string();
        Ok(self.dedupe.write().insert(fingerprint))
    }

    async fn dedupe_already_seen(&self, key: &EventKey) -> Result<bool> {
        let fingerprint = build_dedupe_key(key).as_str().to_string();
        Ok(self.dedupe.read().contains(&fingerprint))
    }
}
