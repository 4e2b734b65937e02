use axum::http::StatusCode;
use std::fmt::Display;

pub fn internal_error(err: impl Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Listen-store failures are connectivity problems the caller may retry, so
/// they surface as 503 rather than a generic 500.
pub fn map_store_error(err: impl Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "listen store error");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Listen store unavailable".to_string(),
    )
}
