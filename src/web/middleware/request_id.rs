//! Per-request tracing spans and response logging.
//!
//! Reuses an inbound `X-Request-Id` (set by a proxy in front of us) when it
//! is a sane header value, otherwise generates a ULID. The resolved ID is
//! echoed back in the `X-Request-Id` response header.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

pub static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest inbound request ID we are willing to adopt.
const MAX_INBOUND_LEN: usize = 128;

#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_INBOUND_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

fn log_response(method: &str, path: &str, status: StatusCode, duration_ms: u64) {
    let status = status.as_u16();
    match status {
        200..=399 => tracing::debug!(method, path, status, duration_ms, "response"),
        400..=499 => tracing::info!(method, path, status, duration_ms, "response"),
        _ => tracing::warn!(method, path, status, duration_ms, "response"),
    }
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let req_id = resolve_request_id(&req);
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let span = tracing::info_span!("request", req_id = %req_id);
        let header_value = HeaderValue::from_str(&req_id).ok();
        let start = Instant::now();

        let future = {
            let _entered = span.enter();
            self.inner.call(req)
        };

        Box::pin(
            async move {
                let mut result = future.await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &mut result {
                    Ok(response) => {
                        log_response(&method, &path, response.status(), duration_ms);
                        if let Some(value) = header_value {
                            response.headers_mut().insert(REQUEST_ID.clone(), value);
                        }
                    }
                    Err(e) => {
                        tracing::error!(method = %method, path = %path, error = ?e, duration_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
