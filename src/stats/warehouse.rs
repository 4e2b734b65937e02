use super::types::StatsError;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::path::PathBuf;

const TOP_ENTITY_LIMIT: i64 = 100;

/// Analytics warehouse the stats job runner pulls aggregates from. Kept
/// behind a trait so tests can stub the expensive queries.
#[async_trait]
pub trait ListenWarehouse: Send + Sync {
    async fn top_artists(&self, musicbrainz_id: &str) -> Result<serde_json::Value>;
    async fn top_recordings(&self, musicbrainz_id: &str) -> Result<serde_json::Value>;
    async fn top_releases(&self, musicbrainz_id: &str) -> Result<serde_json::Value>;
    async fn artist_count(&self, musicbrainz_id: &str) -> Result<i64>;
}

/// Connection settings for the warehouse database, loaded from the JSON file
/// named by the credentials environment variable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WarehouseCredentials {
    pub database_url: String,
}

impl WarehouseCredentials {
    /// Resolve credentials from `var_name`. A missing variable and a missing
    /// file are distinct failures so operators can tell a deployment gap
    /// from a bad mount.
    pub fn from_env(var_name: &str) -> Result<Self, StatsError> {
        let path = std::env::var(var_name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StatsError::NoCredentialsVariable(var_name.to_string()))?;
        let path = PathBuf::from(path);

        let contents = std::fs::read_to_string(&path)
            .map_err(|_| StatsError::NoCredentialsFile(path.clone()))?;
        serde_json::from_str(&contents).map_err(|_| StatsError::InvalidCredentialsFile(path))
    }
}

/// Warehouse backed by a Postgres database holding the listens table; the
/// aggregates group over the opaque track metadata.
pub struct PgListenWarehouse {
    pool: PgPool,
}

impl PgListenWarehouse {
    pub fn connect(credentials: &WarehouseCredentials) -> Result<Self> {
        let pool = crate::db::connect_lazy(&credentials.database_url)?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn top_entities(&self, musicbrainz_id: &str, key: &str) -> Result<serde_json::Value> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT track_metadata->>'{key}' AS name, count(*) AS listen_count
            FROM listens
            WHERE lower(user_name) = lower($1)
              AND track_metadata->>'{key}' IS NOT NULL
            GROUP BY 1
            ORDER BY listen_count DESC, name ASC
            LIMIT $2
            "#
        ))
        .bind(musicbrainz_id)
        .bind(TOP_ENTITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let entries: Vec<serde_json::Value> = rows
            .into_iter()
            .map(|row| {
                Ok(serde_json::json!({
                    "name": row.try_get::<String, _>("name")?,
                    "listen_count": row.try_get::<i64, _>("listen_count")?,
                }))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(serde_json::json!({ "all_time": entries }))
    }
}

#[async_trait]
impl ListenWarehouse for PgListenWarehouse {
    async fn top_artists(&self, musicbrainz_id: &str) -> Result<serde_json::Value> {
        self.top_entities(musicbrainz_id, "artist_name").await
    }

    async fn top_recordings(&self, musicbrainz_id: &str) -> Result<serde_json::Value> {
        self.top_entities(musicbrainz_id, "track_name").await
    }

    async fn top_releases(&self, musicbrainz_id: &str) -> Result<serde_json::Value> {
        self.top_entities(musicbrainz_id, "release_name").await
    }

    async fn artist_count(&self, musicbrainz_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT count(DISTINCT track_metadata->>'artist_name')
            FROM listens
            WHERE lower(user_name) = lower($1)
            "#,
        )
        .bind(musicbrainz_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_variable_is_its_own_error_kind() {
        let err = WarehouseCredentials::from_env("LISTEND_TEST_CREDS_UNSET").unwrap_err();
        assert!(matches!(err, StatsError::NoCredentialsVariable(ref name)
            if name == "LISTEND_TEST_CREDS_UNSET"));
    }

    #[test]
    fn missing_file_is_its_own_error_kind() {
        std::env::set_var(
            "LISTEND_TEST_CREDS_NO_FILE",
            "/nonexistent/listend-warehouse.json",
        );
        let err = WarehouseCredentials::from_env("LISTEND_TEST_CREDS_NO_FILE").unwrap_err();
        assert!(matches!(err, StatsError::NoCredentialsFile(_)));
        std::env::remove_var("LISTEND_TEST_CREDS_NO_FILE");
    }

    #[test]
    fn valid_credentials_file_parses() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"database_url": "postgresql://warehouse@localhost/listens"}}"#
        )
        .expect("write");
        std::env::set_var("LISTEND_TEST_CREDS_OK", file.path());

        let credentials = WarehouseCredentials::from_env("LISTEND_TEST_CREDS_OK").expect("creds");
        assert_eq!(
            credentials.database_url,
            "postgresql://warehouse@localhost/listens"
        );
        std::env::remove_var("LISTEND_TEST_CREDS_OK");
    }

    #[test]
    fn malformed_credentials_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "not json").expect("write");
        std::env::set_var("LISTEND_TEST_CREDS_BAD", file.path());

        let err = WarehouseCredentials::from_env("LISTEND_TEST_CREDS_BAD").unwrap_err();
        assert!(matches!(err, StatsError::InvalidCredentialsFile(_)));
        std::env::remove_var("LISTEND_TEST_CREDS_BAD");
    }
}
