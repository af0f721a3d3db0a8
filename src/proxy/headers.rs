//! HTTP header constants and utilities for the proxy service
//!
//! This module centralizes the header names and header sets the pipeline
//! strips or rewrites, so both directions of the relay agree on them.

use ::http::{header, HeaderMap};

/// Header carrying the proxy's own correlation ID on responses
pub const X_PROXY_REQUEST_ID: &str = "x-proxy-request-id";

/// Standard header re-exports for convenience
pub use header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};

/// Headers that only describe a single transport leg.
///
/// Stripped from the outbound request and from the relayed response.
pub const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Forwarding-identity headers, stripped from the request direction only.
pub const FORWARDING_IDENTITY: &[&str] =
    &["x-forwarded-for", "x-forwarded-host", "x-forwarded-proto"];

/// Methods whose body is forwarded to the target
pub const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// Well-known paths
pub mod paths {
    /// Liveness endpoint, never forwarded
    pub const HEALTH: &str = "/health";
}

/// Common content types
pub mod content_types {
    pub const APPLICATION_JSON: &str = "application/json";
}

/// Remove every header in `names` (all values of each) from `headers`.
pub fn strip(headers: &mut HeaderMap, names: &[&str]) {
    for name in names {
        headers.remove(*name);
    }
}

/// Sanitize a request header map for the outbound leg.
pub fn strip_request_hop_by_hop(headers: &mut HeaderMap) {
    strip(headers, HOP_BY_HOP);
    strip(headers, FORWARDING_IDENTITY);
}

/// Sanitize a target response header map before relaying it.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    strip(headers, HOP_BY_HOP);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::http::HeaderValue;

    fn sample() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("proxy.local"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn test_header_constants() {
        assert!(X_PROXY_REQUEST_ID.starts_with("x-"));
        assert!(paths::HEALTH.starts_with('/'));
        assert!(HOP_BY_HOP
            .iter()
            .chain(FORWARDING_IDENTITY)
            .all(|h| h.chars().all(|c| c.is_ascii_lowercase() || c == '-')));
    }

    #[test]
    fn test_request_direction_strips_forwarding_identity() {
        let mut headers = sample();
        strip_request_hop_by_hop(&mut headers);

        for name in HOP_BY_HOP.iter().chain(FORWARDING_IDENTITY) {
            assert!(!headers.contains_key(*name), "{name} should be stripped");
        }
        assert_eq!(headers.get_all("accept").iter().count(), 2);
    }

    #[test]
    fn test_response_direction_keeps_forwarding_identity() {
        let mut headers = sample();
        strip_response_hop_by_hop(&mut headers);

        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key("transfer-encoding"));
        assert!(headers.contains_key("x-forwarded-for"));
    }
}
