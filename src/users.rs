use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    /// Case-preserving canonical name; lookups against it are
    /// case-insensitive.
    pub musicbrainz_id: String,
    pub auth_token: String,
}

/// Directory of registered users. The profile views resolve the URL user
/// name through this before touching the listen store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch the user named `musicbrainz_id`, creating it with a fresh auth
    /// token if absent. Name matching is case-insensitive; the stored casing
    /// is preserved.
    async fn get_or_create(&self, musicbrainz_id: &str) -> Result<User>;

    async fn get_by_name(&self, musicbrainz_id: &str) -> Result<Option<User>>;

    async fn list(&self) -> Result<Vec<User>>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id bigserial primary key,
            musicbrainz_id text not null,
            auth_token uuid not null,
            created timestamptz not null default now()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create users table")?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS users_musicbrainz_id_ci_idx
        ON users (lower(musicbrainz_id))
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create users index")?;

    Ok(())
}

fn row_to_user(row: sqlx::postgres::PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get::<i64, _>("id")?,
        musicbrainz_id: row.try_get::<String, _>("musicbrainz_id")?,
        auth_token: row.try_get::<Uuid, _>("auth_token")?.to_string(),
    })
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_or_create(&self, musicbrainz_id: &str) -> Result<User> {
        // The no-op update makes RETURNING yield the existing row on
        // conflict, preserving its id, casing and token.
        let row = sqlx::query(
            r#"
            INSERT INTO users (musicbrainz_id, auth_token)
            VALUES ($1, $2)
            ON CONFLICT ((lower(musicbrainz_id)))
            DO UPDATE SET musicbrainz_id = users.musicbrainz_id
            RETURNING id, musicbrainz_id, auth_token
            "#,
        )
        .bind(musicbrainz_id)
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_user(row)?)
    }

    async fn get_by_name(&self, musicbrainz_id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, musicbrainz_id, auth_token
            FROM users
            WHERE lower(musicbrainz_id) = lower($1)
            "#,
        )
        .bind(musicbrainz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user).transpose()?)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, musicbrainz_id, auth_token
            FROM users
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(row_to_user)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_or_create(&self, musicbrainz_id: &str) -> Result<User> {
        let mut users = self.users.write().await;
        if let Some(user) = users
            .iter()
            .find(|user| user.musicbrainz_id.eq_ignore_ascii_case(musicbrainz_id))
        {
            return Ok(user.clone());
        }
        let user = User {
            id: users.len() as i64 + 1,
            musicbrainz_id: musicbrainz_id.to_string(),
            auth_token: Uuid::new_v4().to_string(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_by_name(&self, musicbrainz_id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|user| user.musicbrainz_id.eq_ignore_ascii_case(musicbrainz_id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }
}
