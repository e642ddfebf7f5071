//! Web API router construction and shared response utilities.

use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::middleware::RequestIdLayer;
use crate::web::{challenge, status};

/// Cache-Control presets.
pub mod cache {
    /// Per-visitor responses that must never be shared or stored.
    pub const NO_STORE: &str = "private, no-store";
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/challenge", get(challenge::get_challenge))
        .route("/challenge/daily", get(challenge::get_daily))
        .route("/challenge/random", get(challenge::get_random))
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CompressionLayer::new()
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(60)),
    ))
}
