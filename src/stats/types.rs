use crate::users::User;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Persisted aggregate row for one user.
#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
pub struct UserStats {
    pub user_id: i64,
    #[schema(value_type = Object)]
    pub artists: serde_json::Value,
    #[schema(value_type = Object)]
    pub recordings: serde_json::Value,
    #[schema(value_type = Object)]
    pub releases: serde_json::Value,
    pub artist_count: i64,
    pub last_updated: DateTime<Utc>,
}

/// Identity handed to the stats job runner. Either field may be absent when
/// the caller passes an incomplete record; the runner treats that as a
/// skippable no-op, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsUser {
    pub id: Option<i64>,
    pub musicbrainz_id: Option<String>,
}

impl From<&User> for StatsUser {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id),
            musicbrainz_id: Some(user.musicbrainz_id.clone()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("warehouse credentials variable {0} is not set")]
    NoCredentialsVariable(String),
    #[error("warehouse credentials file {} does not exist or is unreadable", .0.display())]
    NoCredentialsFile(PathBuf),
    #[error("warehouse credentials file {} is not valid JSON", .0.display())]
    InvalidCredentialsFile(PathBuf),
}
