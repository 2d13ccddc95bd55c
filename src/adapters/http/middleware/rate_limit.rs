//! Rate limiting middleware for axum.
//!
//! Checks the API key when the request carries an `X-Api-Key` header, then
//! the client's IP key, then the global key. The first denial wins and
//! stops the remaining checks.
//!
//! Rate limit status is returned in standard HTTP headers:
//! - `X-RateLimit-Limit`: Maximum requests allowed in a burst
//! - `X-RateLimit-Remaining`: Requests remaining right now
//! - `X-RateLimit-Reset`: Unix timestamp when the quota is fully restored
//! - `Retry-After`: Seconds to wait (only on 429 response)
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get, middleware};
//! use std::sync::Arc;
//!
//! let limiter: Arc<dyn RateLimiter> = Arc::new(RuleRateLimiter::new(store, config));
//!
//! let app = Router::new()
//!     .route("/v1/completions", get(handler))
//!     .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::domain::foundation::ErrorCode;
use crate::ports::{RateLimitDenied, RateLimitKey, RateLimitResult, RateLimiter};

/// Rate limiter middleware state.
pub type RateLimiterState = Arc<dyn RateLimiter>;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Rate limiting middleware over global, IP and API-key scopes.
///
/// Returns 429 Too Many Requests on the first denial. Allowed responses
/// carry the headers of the most specific key that was checked.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    // Most specific first, so a client over its own quota never draws on
    // the shared global bucket.
    let mut keys = Vec::with_capacity(3);
    if let Some(api_key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|k| !k.trim().is_empty())
    {
        keys.push(RateLimitKey::api_key(api_key));
    }
    if let Some(ip) = extract_client_ip(&request, connect_info.as_ref()) {
        keys.push(RateLimitKey::ip(&ip));
    }
    keys.push(RateLimitKey::global());

    let mut most_specific = None;
    for key in keys {
        let scope = key.scope;
        match limiter.check(key).await {
            Ok(RateLimitResult::Denied(denied)) => {
                return RateLimitRejection::from(denied).into_response();
            }
            Ok(allowed) => {
                most_specific.get_or_insert(allowed);
            }
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "Rate limit check failed");
            }
        }
    }

    let mut response = next.run(request).await;
    if let Some(result) = most_specific {
        apply_headers(response.headers_mut(), &result);
    }
    response
}

/// Extract client IP from request, checking forwarded headers first.
///
/// Order of precedence:
/// 1. X-Forwarded-For header (first IP in list)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
fn extract_client_ip<B>(
    request: &http::Request<B>,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first_ip) = header("X-Forwarded-For").and_then(|f| f.split(',').next()) {
        let first_ip = first_ip.trim();
        if !first_ip.is_empty() {
            return Some(first_ip.to_string());
        }
    }
    if let Some(real_ip) = header("X-Real-IP") {
        return Some(real_ip.to_string());
    }
    connect_info.map(|ci| ci.0.ip().to_string())
}

/// Copies a result's rate limit headers onto a response.
fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    for (name, value) in result.rate_limit_headers() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}

/// Rejection for rate limit exceeded.
///
/// Handlers that check a per-resource key themselves can return this
/// directly.
#[derive(Debug, Clone)]
pub struct RateLimitRejection {
    pub denied: RateLimitDenied,
}

impl From<RateLimitDenied> for RateLimitRejection {
    fn from(denied: RateLimitDenied) -> Self {
        Self { denied }
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let retry_after_secs = self.denied.retry_after_secs();
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": self.denied.message,
                "code": ErrorCode::RateLimited.as_str(),
                "scope": self.denied.scope,
                "retry_after_secs": retry_after_secs
            })),
        )
            .into_response();

        apply_headers(
            response.headers_mut(),
            &RateLimitResult::Denied(self.denied),
        );
        response
    }
}
