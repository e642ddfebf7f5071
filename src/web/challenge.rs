//! Challenge handlers.
//!
//! `/api/challenge` picks the mode from the visitor's completion cookie;
//! `/api/challenge/daily` and `/api/challenge/random` force one.

use crate::catalogue::Item;
use crate::challenge::{Challenge, Mode};
use crate::clock::{parse_timezone, today_in};
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::middleware::ClientIp;
use crate::web::routes::{cache, with_cache_control};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

/// Cookie holding the date (`YYYY-MM-DD`) the visitor last finished the daily challenge.
pub const COMPLETED_COOKIE: &str = "dailyChallengeDate";
/// Header a client may use instead of the `tz` query parameter.
pub const TIMEZONE_HEADER: &str = "x-timezone";

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeQuery {
    /// IANA timezone name of the visitor.
    pub tz: Option<String>,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct ChallengeResponse {
    pub items: Vec<Item>,
    #[serde(rename = "type")]
    pub mode: Mode,
    pub date: String,
}

impl From<Challenge> for ChallengeResponse {
    fn from(challenge: Challenge) -> Self {
        Self {
            items: challenge.items.to_vec(),
            mode: challenge.mode,
            date: challenge.date,
        }
    }
}

/// `tz` query parameter, then the `x-timezone` header, then the server default.
fn resolve_timezone(
    query: &ChallengeQuery,
    headers: &HeaderMap,
    default: Tz,
) -> Result<Tz, ApiError> {
    let requested = query.tz.as_deref().filter(|tz| !tz.trim().is_empty()).or_else(|| {
        headers
            .get(TIMEZONE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|tz| !tz.trim().is_empty())
    });

    match requested {
        Some(name) => parse_timezone(name).map_err(ApiError::invalid_timezone),
        None => Ok(default),
    }
}

/// Value of the completion cookie, if the visitor sent one.
fn completed_on(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(cookie::Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == COMPLETED_COOKIE)
        .map(|c| c.value().trim().to_owned())
}

async fn serve(
    state: &AppState,
    ip: ClientIp,
    tz: Tz,
    mode: Option<Mode>,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let today = today_in(tz);
    let mode = mode.unwrap_or_else(|| Mode::for_visitor(completed_on(headers).as_deref(), &today));

    let challenge = state.challenge.read(mode, tz, today_in).await?;
    info!(
        ip = %ip,
        mode = %challenge.mode,
        date = %challenge.date,
        day = %challenge.day,
        tz = %tz,
        "serving challenge"
    );

    Ok(with_cache_control(
        ChallengeResponse::from(challenge),
        cache::NO_STORE,
    ))
}

/// `GET /api/challenge`
pub(super) async fn get_challenge(
    State(state): State<AppState>,
    ip: ClientIp,
    Query(query): Query<ChallengeQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let tz = resolve_timezone(&query, &headers, state.default_timezone)?;
    serve(&state, ip, tz, None, &headers).await
}

/// `GET /api/challenge/daily`
pub(super) async fn get_daily(
    State(state): State<AppState>,
    ip: ClientIp,
    Query(query): Query<ChallengeQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let tz = resolve_timezone(&query, &headers, state.default_timezone)?;
    serve(&state, ip, tz, Some(Mode::Daily), &headers).await
}

/// `GET /api/challenge/random`
pub(super) async fn get_random(
    State(state): State<AppState>,
    ip: ClientIp,
    Query(query): Query<ChallengeQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let tz = resolve_timezone(&query, &headers, state.default_timezone)?;
    serve(&state, ip, tz, Some(Mode::Random), &headers).await
}
