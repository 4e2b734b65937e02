use super::types::UserStats;
use crate::clock::Clock;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json as SqlJson;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage for precomputed per-user aggregates. One row per user; an upsert
/// refreshes the row and its `last_updated` stamp, which also drives the
/// job runner's cooldown.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn insert_user_stats(
        &self,
        user_id: i64,
        artists: serde_json::Value,
        recordings: serde_json::Value,
        releases: serde_json::Value,
        artist_count: i64,
    ) -> Result<()>;

    async fn get_all_user_stats(&self, user_id: i64) -> Result<Option<UserStats>>;

    async fn last_calculated(&self, user_id: i64) -> Result<Option<DateTime<Utc>>>;
}

pub struct PgStatsStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgStatsStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_stats (
            user_id bigint primary key,
            artists jsonb not null,
            recordings jsonb not null,
            releases jsonb not null,
            artist_count bigint not null,
            last_updated timestamptz not null
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create user_stats table")?;
    Ok(())
}

fn row_to_stats(row: sqlx::postgres::PgRow) -> Result<UserStats, sqlx::Error> {
    Ok(UserStats {
        user_id: row.try_get::<i64, _>("user_id")?,
        artists: row.try_get::<SqlJson<serde_json::Value>, _>("artists")?.0,
        recordings: row
            .try_get::<SqlJson<serde_json::Value>, _>("recordings")?
            .0,
        releases: row.try_get::<SqlJson<serde_json::Value>, _>("releases")?.0,
        artist_count: row.try_get::<i64, _>("artist_count")?,
        last_updated: row.try_get::<DateTime<Utc>, _>("last_updated")?,
    })
}

#[async_trait]
impl StatsStore for PgStatsStore {
    async fn insert_user_stats(
        &self,
        user_id: i64,
        artists: serde_json::Value,
        recordings: serde_json::Value,
        releases: serde_json::Value,
        artist_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_stats (user_id, artists, recordings, releases, artist_count, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id)
            DO UPDATE SET artists = $2,
                          recordings = $3,
                          releases = $4,
                          artist_count = $5,
                          last_updated = $6
            "#,
        )
        .bind(user_id)
        .bind(SqlJson(artists))
        .bind(SqlJson(recordings))
        .bind(SqlJson(releases))
        .bind(artist_count)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_all_user_stats(&self, user_id: i64) -> Result<Option<UserStats>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, artists, recordings, releases, artist_count, last_updated
            FROM user_stats
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_stats).transpose()?)
    }

    async fn last_calculated(&self, user_id: i64) -> Result<Option<DateTime<Utc>>> {
        let stamp: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_updated FROM user_stats WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(stamp)
    }
}

pub struct MemoryStatsStore {
    clock: Arc<dyn Clock>,
    rows: RwLock<HashMap<i64, UserStats>>,
}

impl MemoryStatsStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rows: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn insert_user_stats(
        &self,
        user_id: i64,
        artists: serde_json::Value,
        recordings: serde_json::Value,
        releases: serde_json::Value,
        artist_count: i64,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert(
            user_id,
            UserStats {
                user_id,
                artists,
                recordings,
                releases,
                artist_count,
                last_updated: self.clock.now(),
            },
        );
        Ok(())
    }

    async fn get_all_user_stats(&self, user_id: i64) -> Result<Option<UserStats>> {
        Ok(self.rows.read().await.get(&user_id).cloned())
    }

    async fn last_calculated(&self, user_id: i64) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&user_id)
            .map(|stats| stats.last_updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[tokio::test]
    async fn upsert_replaces_the_row_and_refreshes_the_stamp() {
        let store = MemoryStatsStore::new(Arc::new(FixedClock::at_epoch(1_000_000)));
        store
            .insert_user_stats(1, serde_json::json!({}), serde_json::json!({}), serde_json::json!({}), 2)
            .await
            .unwrap();
        store
            .insert_user_stats(1, serde_json::json!({}), serde_json::json!({}), serde_json::json!({}), 5)
            .await
            .unwrap();

        let stats = store.get_all_user_stats(1).await.unwrap().unwrap();
        assert_eq!(stats.artist_count, 5);
        assert_eq!(
            store.last_calculated(1).await.unwrap(),
            Some(stats.last_updated)
        );
        assert!(store.get_all_user_stats(2).await.unwrap().is_none());
    }
}
