//! Target URL resolution for proxy requests
//!
//! The inbound path carries the whole target URL as one percent-encoded
//! token: `/https%3A%2F%2Fapi.example.com%2Fv1%3Fq%3D1`. The remainder after
//! the leading `/` is decoded as a unit and never split on `/` first, so a
//! target path containing an encoded `/` survives intact.

use crate::proxy::types::*;
use hyper::Uri;
use url::Url;

/// Strategy for resolving target URLs from inbound request URIs
pub struct UrlResolver;

impl UrlResolver {
    /// Resolve the target encoded in an inbound request URI.
    ///
    /// The raw query of the inbound URI, if any, is part of the token.
    pub fn resolve_uri(uri: &Uri) -> ProxyResult<TargetDescriptor> {
        let raw = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        Self::resolve(raw)
    }

    /// Resolve a raw inbound path (leading separator included or not).
    pub fn resolve(raw_path: &str) -> ProxyResult<TargetDescriptor> {
        let encoded = raw_path.strip_prefix('/').unwrap_or(raw_path);
        if encoded.is_empty() {
            return Err(ProxyError::MissingTarget);
        }

        let decoded = Self::decode(encoded)?;
        Self::parse_target(&decoded)
    }

    /// Append an inbound path and query to a fixed base target.
    ///
    /// Nothing is decoded in this mode; the inbound path is taken literally.
    /// Dot segments are rejected so the result never leaves the base path.
    pub fn resolve_fixed(base: &TargetDescriptor, uri: &Uri) -> ProxyResult<TargetDescriptor> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        if uri.path().split('/').any(is_dot_segment) {
            return Err(ProxyError::InvalidTargetUrl {
                url: path_and_query.to_string(),
                reason: "dot segment in path".to_string(),
            });
        }
        let joined = format!(
            "{}://{}{}{}",
            base.scheme(),
            base.authority(),
            base.path().trim_end_matches('/'),
            path_and_query
        );
        Self::parse_target(&joined)
    }

    /// Percent-decode the full token, rejecting malformed escapes.
    fn decode(encoded: &str) -> ProxyResult<String> {
        let bytes = encoded.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let well_formed = bytes.len() > i + 2
                    && bytes[i + 1].is_ascii_hexdigit()
                    && bytes[i + 2].is_ascii_hexdigit();
                if !well_formed {
                    return Err(ProxyError::InvalidEncoding {
                        input: encoded.to_string(),
                    });
                }
                i += 3;
            } else {
                i += 1;
            }
        }

        urlencoding::decode(encoded)
            .map(|decoded| decoded.into_owned())
            .map_err(|_| ProxyError::InvalidEncoding {
                input: encoded.to_string(),
            })
    }

    /// Parse an absolute URL and enforce the scheme allow-list.
    pub fn parse_target(candidate: &str) -> ProxyResult<TargetDescriptor> {
        let url = Url::parse(candidate).map_err(|e| ProxyError::InvalidTargetUrl {
            url: candidate.to_string(),
            reason: e.to_string(),
        })?;

        let scheme =
            Scheme::from_url_scheme(url.scheme()).ok_or_else(|| ProxyError::DisallowedProtocol {
                protocol: url.scheme().to_string(),
                url: candidate.to_string(),
            })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProxyError::InvalidTargetUrl {
                url: candidate.to_string(),
                reason: "missing host".to_string(),
            })?;

        if !url.username().is_empty() || url.password().is_some() {
            let mut redacted = url.clone();
            let _ = redacted.set_password(None);
            let _ = redacted.set_username("");
            return Err(ProxyError::InvalidTargetUrl {
                url: redacted.to_string(),
                reason: "credentials in target URL".to_string(),
            });
        }

        Ok(TargetDescriptor::new(
            scheme,
            host,
            url.port(),
            url.path(),
            url.query().map(str::to_string),
        ))
    }

    /// Parse the configured base for fixed-target mode.
    ///
    /// Inbound queries replace the base query, so a base carrying one is
    /// rejected.
    pub fn parse_base(candidate: &str) -> ProxyResult<TargetDescriptor> {
        let base = Self::parse_target(candidate)?;
        if base.query().is_some() {
            return Err(ProxyError::InvalidTargetUrl {
                url: candidate.to_string(),
                reason: "base URL must not carry a query".to_string(),
            });
        }
        Ok(base)
    }
}

/// `.` or `..`, including their percent-encoded spellings
fn is_dot_segment(segment: &str) -> bool {
    let normalized = segment.to_ascii_lowercase().replace("%2e", ".");
    normalized == "." || normalized == ".."
}
