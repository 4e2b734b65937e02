use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::health::HealthResponse;
use crate::routes::users;
use crate::state::AppState;
use crate::store::TrackMetadata;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "listend",
        description = "Append-only listen history with windowed queries and precomputed listening stats"
    ),
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::users::user_profile,
        crate::routes::users::user_listens,
        crate::routes::users::user_stats,
    ),
    components(schemas(
        HealthResponse,
        TrackMetadata,
        users::ListenResponse,
        users::ProfileResponse,
        users::ListensResponse,
        users::UserStatsResponse,
    )),
    tags(
        (name = "users", description = "Listen history and statistics per user")
    )
)]
struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_else(|_| serde_json::json!({}))
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_user_route() {
        let doc = openapi_json();
        let paths = doc["paths"].as_object().expect("paths object");
        assert!(paths.contains_key("/healthz"));
        assert!(paths.contains_key("/api/users/{user_name}"));
        assert!(paths.contains_key("/api/users/{user_name}/listens"));
        assert!(paths.contains_key("/api/users/{user_name}/stats"));
    }
}
