//! In-process store with per-key expiry.

use crate::catalogue::Item;
use crate::store::{ChallengeStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, (Vec<Item>, Instant)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries. Expired entries are dropped first.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, StoreError> {
        let now = Instant::now();
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        let (items, expires_at) = entry.value();
        if *expires_at <= now {
            drop(entry);
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
            return Ok(None);
        }
        Ok(Some(items.clone()))
    }

    async fn put(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_owned(), (items.to_vec(), Instant::now() + ttl));
        Ok(())
    }
}
