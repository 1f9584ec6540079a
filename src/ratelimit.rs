//! Per-client sliding-window rate limiting for the public auth endpoints.
//!
//! Attempts are tracked in memory, keyed by the forwarded client IP (or the
//! socket address). Over the limit the client gets a 429 with `Retry-After`;
//! every response carries the `X-RateLimit-*` headers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use time::OffsetDateTime;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed { limit: u32, remaining: u32, reset: i64 },
    Limited { limit: u32, retry_after: i64, reset: i64 },
}

/// Sliding window over the last `window` seconds, per client key.
pub struct RateLimiter {
    max_attempts: u32,
    window: i64,
    hits: Mutex<HashMap<String, Vec<i64>>>,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_seconds: i64) -> Self {
        Self {
            max_attempts,
            window: window_seconds,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str, now: i64) -> Decision {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        let cutoff = now - self.window;
        hits.retain(|_, stamps| {
            stamps.retain(|t| *t > cutoff);
            !stamps.is_empty()
        });

        let stamps = hits.entry(key.to_string()).or_default();
        if stamps.len() as u32 >= self.max_attempts {
            let oldest = stamps.iter().copied().min().unwrap_or(now);
            let retry_after = (oldest + self.window - now).max(1);
            return Decision::Limited {
                limit: self.max_attempts,
                retry_after,
                reset: now + retry_after,
            };
        }

        stamps.push(now);
        Decision::Allowed {
            limit: self.max_attempts,
            remaining: self.max_attempts - stamps.len() as u32,
            reset: now + self.window,
        }
    }
}

/// First hop of `X-Forwarded-For` when present, otherwise the peer address.
fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_auth_attempts(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    let now = OffsetDateTime::now_utc().unix_timestamp();

    match state.rate_limiter.check(&key, now) {
        Decision::Limited {
            limit,
            retry_after,
            reset,
        } => {
            warn!(client = %key, retry_after, "rate limit exceeded");
            let mut res = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many requests, try again later" })),
            )
                .into_response();
            let headers = res.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(0));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
            res
        }
        Decision::Allowed {
            limit,
            remaining,
            reset,
        } => {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
            res
        }
    }
}
