//! Postgres-backed challenge store.
//!
//! Backed by the `challenge_kv` UNLOGGED table: values are JSON arrays of
//! items with an absolute expiry. Rows past their expiry are invisible to
//! reads and removed by [`PgStore::purge_expired`].

use crate::catalogue::Item;
use crate::store::{ChallengeStore, StoreError};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired rows, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM challenge_kv WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ChallengeStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, StoreError> {
        let value: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT value FROM challenge_kv WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        value
            .map(serde_json::from_value::<Vec<Item>>)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn put(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO challenge_kv (key, value, expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3))
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value,
                          expires_at = EXCLUDED.expires_at,
                          updated_at = now()
            "#,
        )
        .bind(key)
        .bind(Json(items))
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
