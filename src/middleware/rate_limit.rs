use std::net::{IpAddr, SocketAddr};

use axum::{http::HeaderMap, http::StatusCode, Json};
use serde_json::json;

/// Checks a fixed-window rate limit stored in Redis.
///
/// Uses the INCR + EXPIRE strategy:
/// - Increments a counter for `key`
/// - On first increment, sets TTL to `window_secs`
/// - Returns 429 if counter exceeds `max_attempts`
pub async fn check_rate_limit(
    redis: &mut redis::aio::MultiplexedConnection,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let count: u64 = redis::cmd("INCR")
        .arg(key)
        .query_async(redis)
        .await
        .unwrap_or(0);

    if count == 1 {
        // Set TTL only on first increment to avoid resetting the window on each attempt
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(redis)
            .await;
    }

    if count > max_attempts {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests, please try again later." })),
        ));
    }

    Ok(())
}

/// Rate-limit key for a route and client.
///
/// Forwarding headers are client-controlled unless a proxy rewrites them, so
/// they are read only when `trust_proxy` is set. Then `X-Real-IP` wins, else
/// the last `X-Forwarded-For` hop (the one appended by our proxy). Values that
/// are not IP addresses are ignored.
pub fn client_key(scope: &str, headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> String {
    let ip = trust_proxy
        .then(|| proxied_ip(headers))
        .flatten()
        .unwrap_or_else(|| peer.ip());
    format!("rate:{scope}:{ip}")
}

fn proxied_ip(headers: &HeaderMap) -> Option<IpAddr> {
    header(headers, "x-real-ip")
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| {
            header(headers, "x-forwarded-for")
                .and_then(|v| v.rsplit(',').next())
                .and_then(|v| v.trim().parse().ok())
        })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> SocketAddr {
        "203.0.113.7:51000".parse().unwrap()
    }

    #[test]
    fn key_uses_peer_address_without_proxy_header() {
        assert_eq!(client_key("create", &HeaderMap::new(), peer(), true), "rate:create:203.0.113.7");
    }

    #[test]
    fn forwarding_headers_are_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("1.1.1.1"));
        headers.insert("X-Real-IP", HeaderValue::from_static("2.2.2.2"));
        assert_eq!(client_key("create", &headers, peer(), false), "rate:create:203.0.113.7");

        // A client rotating the header still lands in one bucket.
        let mut rotated = HeaderMap::new();
        rotated.insert("X-Forwarded-For", HeaderValue::from_static("2.2.2.2"));
        assert_eq!(
            client_key("create", &headers, peer(), false),
            client_key("create", &rotated, peer(), false)
        );
    }

    #[test]
    fn trusted_proxy_prefers_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("198.51.100.9"));
        headers.insert("X-Forwarded-For", HeaderValue::from_static("1.1.1.1, 198.51.100.4"));
        assert_eq!(client_key("stats", &headers, peer(), true), "rate:stats:198.51.100.9");
    }

    #[test]
    fn trusted_proxy_uses_last_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("1.1.1.1, 198.51.100.4"));
        assert_eq!(client_key("stats", &headers, peer(), true), "rate:stats:198.51.100.4");
    }

    #[test]
    fn garbage_forwarded_values_fall_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("not-an-ip"));
        headers.insert("X-Forwarded-For", HeaderValue::from_static("also garbage"));
        assert_eq!(client_key("stats", &headers, peer(), true), "rate:stats:203.0.113.7");
    }
}
