use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use url::form_urlencoded;

use crate::error::{internal_error, map_store_error};
use crate::state::AppState;
use crate::store::{Listen, ListenWindow, TrackMetadata, DEFAULT_LISTEN_LIMIT};

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct ListenResponse {
    listened_at: i64,
    track_metadata: TrackMetadata,
}

impl From<Listen> for ListenResponse {
    fn from(listen: Listen) -> Self {
        Self {
            listened_at: listen.listened_at,
            track_metadata: listen.track_metadata,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct ProfileResponse {
    user_name: String,
    listens: Vec<ListenResponse>,
    /// Null until the stats job has run for this user.
    artist_count: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct ListensResponse {
    user_name: String,
    listens: Vec<ListenResponse>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct UserStatsResponse {
    user_name: String,
    #[schema(value_type = Object)]
    artists: serde_json::Value,
    #[schema(value_type = Object)]
    recordings: serde_json::Value,
    #[schema(value_type = Object)]
    releases: serde_json::Value,
    artist_count: i64,
    last_updated: DateTime<Utc>,
}

fn parse_ts_arg(name: &str, value: &str) -> Result<i64, (StatusCode, String)> {
    value.parse::<i64>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("Incorrect timestamp argument {name}: {value}"),
        )
    })
}

/// Parse `max_ts`/`min_ts` into a listen window. Runs before any user or
/// store access so a malformed value fails the request without touching
/// storage. When both are present only `max_ts` is carried forward.
fn parse_listen_window(raw: Option<&str>) -> Result<ListenWindow, (StatusCode, String)> {
    let mut max_ts: Option<i64> = None;
    let mut min_ts: Option<i64> = None;

    if let Some(raw) = raw {
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "max_ts" => max_ts = Some(parse_ts_arg("max_ts", value.as_ref())?),
                "min_ts" => min_ts = Some(parse_ts_arg("min_ts", value.as_ref())?),
                _ => {}
            }
        }
    }

    Ok(ListenWindow {
        from_ts: if max_ts.is_some() { None } else { min_ts },
        to_ts: max_ts,
        limit: DEFAULT_LISTEN_LIMIT,
    })
}

async fn fetch_profile_listens(
    state: &AppState,
    user_name: &str,
    raw_query: Option<&str>,
) -> Result<(crate::users::User, Vec<ListenResponse>), (StatusCode, String)> {
    let window = parse_listen_window(raw_query)?;

    let user = state
        .users
        .get_by_name(user_name)
        .await
        .map_err(internal_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            format!("User {user_name} not found"),
        ))?;

    let listens = state
        .store
        .fetch_listens(&user.musicbrainz_id, window)
        .await
        .map_err(map_store_error)?;

    Ok((user, listens.into_iter().map(ListenResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_name}",
    tag = "users",
    params(
        ("user_name" = String, Path, description = "MusicBrainz user name (case-insensitive)"),
        ("max_ts" = Option<i64>, Query, description = "Exclusive upper bound on listened_at; wins over min_ts"),
        ("min_ts" = Option<i64>, Query, description = "Exclusive lower bound on listened_at")
    ),
    responses(
        (status = 200, description = "Profile with recent listens", body = ProfileResponse),
        (status = 400, description = "Malformed timestamp argument"),
        (status = 404, description = "Unknown user"),
        (status = 503, description = "Listen store unavailable")
    )
)]
pub(crate) async fn user_profile(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let (user, listens) = fetch_profile_listens(&state, &user_name, raw.as_deref()).await?;

    let artist_count = state
        .stats
        .get_all_user_stats(user.id)
        .await
        .map_err(internal_error)?
        .map(|stats| stats.artist_count);

    Ok(Json(ProfileResponse {
        user_name: user.musicbrainz_id,
        listens,
        artist_count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_name}/listens",
    tag = "users",
    params(
        ("user_name" = String, Path, description = "MusicBrainz user name (case-insensitive)"),
        ("max_ts" = Option<i64>, Query, description = "Exclusive upper bound on listened_at; wins over min_ts"),
        ("min_ts" = Option<i64>, Query, description = "Exclusive lower bound on listened_at")
    ),
    responses(
        (status = 200, description = "Windowed listens, newest first", body = ListensResponse),
        (status = 400, description = "Malformed timestamp argument"),
        (status = 404, description = "Unknown user"),
        (status = 503, description = "Listen store unavailable")
    )
)]
pub(crate) async fn user_listens(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ListensResponse>, (StatusCode, String)> {
    let (user, listens) = fetch_profile_listens(&state, &user_name, raw.as_deref()).await?;
    Ok(Json(ListensResponse {
        user_name: user.musicbrainz_id,
        listens,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_name}/stats",
    tag = "users",
    params(
        ("user_name" = String, Path, description = "MusicBrainz user name (case-insensitive)")
    ),
    responses(
        (status = 200, description = "Precomputed aggregates", body = UserStatsResponse),
        (status = 404, description = "Unknown user or no stats calculated yet")
    )
)]
pub(crate) async fn user_stats(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<Json<UserStatsResponse>, (StatusCode, String)> {
    let user = state
        .users
        .get_by_name(&user_name)
        .await
        .map_err(internal_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            format!("User {user_name} not found"),
        ))?;

    let stats = state
        .stats
        .get_all_user_stats(user.id)
        .await
        .map_err(internal_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "No statistics calculated for this user yet".to_string(),
        ))?;

    Ok(Json(UserStatsResponse {
        user_name: user.musicbrainz_id,
        artists: stats.artists,
        recordings: stats.recordings,
        releases: stats.releases,
        artist_count: stats.artist_count,
        last_updated: stats.last_updated,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_name}", get(user_profile))
        .route("/users/{user_name}/listens", get(user_listens))
        .route("/users/{user_name}/stats", get(user_stats))
}
