use super::{Listen, ListenStore, ListenWindow, ResolvedWindow, TrackMetadata};
use crate::clock::Clock;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json as SqlJson;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Postgres-backed listen store. Listens are append-only rows indexed by
/// `(lower(user_name), listened_at)`.
pub struct PgListenStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgListenStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listens (
            id bigserial primary key,
            user_name text not null,
            listened_at bigint not null,
            track_metadata jsonb not null
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create listens table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS listens_user_listened_at_idx
        ON listens (lower(user_name), listened_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create listens index")?;

    Ok(())
}

fn row_to_listen(row: sqlx::postgres::PgRow) -> Result<Listen, sqlx::Error> {
    Ok(Listen {
        user_name: row.try_get::<String, _>("user_name")?,
        listened_at: row.try_get::<i64, _>("listened_at")?,
        track_metadata: row
            .try_get::<SqlJson<TrackMetadata>, _>("track_metadata")?
            .0,
    })
}

#[async_trait]
impl ListenStore for PgListenStore {
    async fn insert(&self, listens: &[Listen]) -> Result<()> {
        if listens.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for listen in listens {
            sqlx::query(
                r#"
                INSERT INTO listens (user_name, listened_at, track_metadata)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(&listen.user_name)
            .bind(listen.listened_at)
            .bind(SqlJson(&listen.track_metadata))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(count = listens.len(), "inserted listens");
        Ok(())
    }

    async fn fetch_listens(&self, user_name: &str, window: ListenWindow) -> Result<Vec<Listen>> {
        let limit = window.limit as i64;

        let resolved = window.resolve(self.clock.as_ref());
        let rows = match resolved {
            ResolvedWindow::Before { to_ts } => {
                sqlx::query(
                    r#"
                    SELECT user_name, listened_at, track_metadata
                    FROM listens
                    WHERE lower(user_name) = lower($1)
                      AND listened_at < $2
                    ORDER BY listened_at DESC
                    LIMIT $3
                    "#,
                )
                .bind(user_name)
                .bind(to_ts)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            ResolvedWindow::After { from_ts } => {
                // Ascending so the limit keeps the listens adjacent to the
                // bound; reversed below to present newest first.
                sqlx::query(
                    r#"
                    SELECT user_name, listened_at, track_metadata
                    FROM listens
                    WHERE lower(user_name) = lower($1)
                      AND listened_at > $2
                    ORDER BY listened_at ASC
                    LIMIT $3
                    "#,
                )
                .bind(user_name)
                .bind(from_ts)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut listens = rows
            .into_iter()
            .map(row_to_listen)
            .collect::<Result<Vec<_>, _>>()?;
        if matches!(resolved, ResolvedWindow::After { .. }) {
            listens.reverse();
        }
        Ok(listens)
    }
}
