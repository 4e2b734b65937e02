pub mod memory;
pub mod postgres;

use crate::clock::Clock;
use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryListenStore;
pub use postgres::PgListenStore;

/// Listens returned per query unless the caller asks for fewer.
pub const DEFAULT_LISTEN_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct TrackMetadata {
    pub artist_name: String,
    pub track_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    /// Opaque payload (MusicBrainz ids, tags, client info). Persisted and
    /// returned verbatim, never interpreted by the store.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    #[schema(value_type = Object)]
    pub additional_info: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct Listen {
    pub user_name: String,
    /// Seconds since the epoch; the sole sort and filter key.
    pub listened_at: i64,
    pub track_metadata: TrackMetadata,
}

/// Bounded time window for a listen query. Both bounds are exclusive; when
/// both are supplied only the upper bound is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenWindow {
    pub from_ts: Option<i64>,
    pub to_ts: Option<i64>,
    pub limit: usize,
}

impl Default for ListenWindow {
    fn default() -> Self {
        Self {
            from_ts: None,
            to_ts: None,
            limit: DEFAULT_LISTEN_LIMIT,
        }
    }
}

/// A window with precedence and the clock default applied, ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedWindow {
    /// Listens with `listened_at < to_ts`, newest first.
    Before { to_ts: i64 },
    /// The oldest listens with `listened_at > from_ts`, returned newest first.
    After { from_ts: i64 },
}

impl ListenWindow {
    pub fn resolve(&self, clock: &dyn Clock) -> ResolvedWindow {
        match (self.to_ts, self.from_ts) {
            // to_ts wins whenever present, even with from_ts also set.
            (Some(to_ts), _) => ResolvedWindow::Before { to_ts },
            (None, Some(from_ts)) => ResolvedWindow::After { from_ts },
            (None, None) => ResolvedWindow::Before {
                to_ts: clock.now_ts(),
            },
        }
    }
}

/// Append-only, per-user time-ordered store of listen events.
///
/// Callers hand the store already-parsed integer timestamps; parameter
/// validation lives at the HTTP boundary. Lookups by user name are
/// case-insensitive. A read that starts after an insert completes observes
/// that insert for the same user.
#[async_trait]
pub trait ListenStore: Send + Sync {
    /// Append a batch of listens for one or more users. Duplicate timestamps
    /// are permitted.
    async fn insert(&self, listens: &[Listen]) -> Result<()>;

    /// Up to `window.limit` listens for `user_name`, newest first, bounded by
    /// the resolved window.
    async fn fetch_listens(&self, user_name: &str, window: ListenWindow) -> Result<Vec<Listen>>;
}
