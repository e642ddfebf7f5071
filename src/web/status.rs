//! Health and cache status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use tracing::trace;
use ts_rs::TS;

use crate::state::AppState;

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct HealthResponse {
    status: String,
    version: String,
    commit: String,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DailyStatus {
    date: String,
    age_secs: u64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusResponse {
    version: String,
    commit: String,
    /// Cached daily challenge, if one has been loaded.
    daily: Option<DailyStatus>,
    /// Age of the cached random window in seconds.
    random_age_secs: Option<u64>,
    read_deadline_ms: u64,
}

/// Health check endpoint
pub(super) async fn health() -> Json<HealthResponse> {
    trace!("health check requested");
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_SHORT").to_string(),
    })
}

/// Cache status endpoint
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let service = &state.challenge;
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        daily: service.daily().peek().map(|(date, age)| DailyStatus {
            date,
            age_secs: age.as_secs(),
        }),
        random_age_secs: service.random().peek().map(|age| age.as_secs()),
        read_deadline_ms: u64::try_from(service.deadline().as_millis()).unwrap_or(u64::MAX),
    })
}
