//! Per-client fixed-window rate limiting.
//!
//! Every admitted response carries `RateLimit-Limit`, `RateLimit-Remaining`
//! and `RateLimit-Reset`. Rejected requests get 429 with `Retry-After`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kindred_core::rate_limit::{FixedWindowLimiter, RateDecision};
use tokio_util::sync::CancellationToken;

use super::client::client_ip;
use crate::error::AppError;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Key used when the client address cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Paths that never count against the limit.
const EXEMPT_PATHS: &[&str] = &["/health"];

/// Axum middleware applying the state's limiter, if any.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_ip(
        request.headers(),
        peer,
        state.config.rate_limit.trust_forwarded_for,
    )
    .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    let decision = limiter.check(&key, Instant::now());
    if !decision.allowed {
        tracing::warn!(client = %key, "Rate limit exceeded");
        let mut response = AppError::TooManyRequests {
            message: "Too many requests, please try again later".into(),
            retry_after_secs: decision.reset_after_secs(),
        }
        .into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_after_secs()));
}

/// Periodically drop expired windows so idle clients do not accumulate.
pub fn start_pruning(
    limiter: Arc<FixedWindowLimiter>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = limiter.window().max(Duration::from_secs(60));
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let removed = limiter.prune(Instant::now());
                    tracing::debug!(
                        removed,
                        tracked = limiter.tracked_keys(),
                        "Pruned rate limit windows"
                    );
                }
            }
        }
    })
}
