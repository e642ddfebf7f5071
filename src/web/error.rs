//! JSON error responses.

use crate::challenge::ChallengeError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use ts_rs::TS;

/// Machine-readable error codes returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    UpstreamUnavailable,
    Timeout,
    InvalidTimezone,
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ApiErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::InvalidTimezone => StatusCode::BAD_REQUEST,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body: `{ code, message, details }`.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_timezone(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidTimezone, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<ChallengeError> for ApiError {
    fn from(err: ChallengeError) -> Self {
        match err {
            // Players only see that the catalogue failed, not upstream internals.
            ChallengeError::Upstream(_) => ApiError::new(
                ApiErrorCode::UpstreamUnavailable,
                "could not load data from the catalogue",
            ),
            ChallengeError::Timeout(deadline) => ApiError::new(
                ApiErrorCode::Timeout,
                "the catalogue did not answer in time",
            )
            .with_details(serde_json::json!({
                "deadlineMs": u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX)
            })),
            ChallengeError::Aborted(reason) => {
                tracing::error!(reason = %reason, "challenge fetch aborted");
                ApiError::internal_error("failed to load the challenge")
            }
        }
    }
}
