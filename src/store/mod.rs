//! Optional durable storage for daily challenges.
//!
//! A store is a cache, never a source of truth: every failure here is logged
//! by the caller and treated as a miss.

pub mod memory;
pub mod postgres;

use crate::catalogue::Item;
use async_trait::async_trait;
use std::time::Duration;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Items stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, StoreError>;

    /// Store `items` under `key` for `ttl`, replacing any previous value.
    async fn put(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), StoreError>;
}
