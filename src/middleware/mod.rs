pub mod rate_limit;

pub use rate_limit::RateLimiter;

use axum::http::HeaderMap;

/// Best-effort client identity for rate limiting: first hop of
/// `X-Forwarded-For` when running behind a proxy.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
