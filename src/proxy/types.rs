//! Type definitions for the proxy module

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// ========== Size Types ==========

/// Maximum size for inbound request bodies in bytes
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |size: &usize| *size > 0),
)]
pub struct RequestSizeLimit(usize);

/// Size of an HTTP body in bytes
#[nutype(derive(Clone, Copy, Debug, Display, PartialEq, Deserialize, Serialize, From, AsRef))]
pub struct BodySize(usize);

// ========== Constants ==========

/// Default inbound body limit (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default outbound exchange timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ========== Target ==========

/// Transport scheme of a target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Parse from a URL scheme; only `http` and `https` are accepted
    pub fn from_url_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved destination of a forwarded request
///
/// `port` is `None` when the URL used the scheme's default port; `path`
/// always starts with `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetDescriptor {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

impl TargetDescriptor {
    pub fn new(
        scheme: Scheme,
        host: impl Into<String>,
        port: Option<u16>,
        path: impl Into<String>,
        query: Option<String>,
    ) -> Self {
        let path = path.into();
        let port = port.filter(|p| *p != scheme.default_port());
        Self {
            scheme,
            host: host.into(),
            port,
            path: if path.is_empty() { "/".to_string() } else { path },
            query,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit, non-default port if one was given
    pub fn explicit_port(&self) -> Option<u16> {
        self.port
    }

    /// Port actually dialed
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Value for the outbound `host` header
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }

    /// Path plus query as sent on the request line
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// Reconstruct the target as an `http::Uri` for the client
    pub fn to_uri(&self) -> ProxyResult<http::Uri> {
        let uri = self.to_string();
        uri.parse().map_err(|_| ProxyError::InvalidTargetUrl {
            url: uri,
            reason: "not a valid request URI".to_string(),
        })
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path_and_query())
    }
}

/// Proxy configuration, built once at startup and shared read-only
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Maximum inbound body size in bytes
    pub max_request_size: RequestSizeLimit,
    /// Overall outbound exchange timeout
    pub request_timeout: Duration,
    /// Fixed base target; when set, paths are appended instead of decoded
    pub target_host: Option<TargetDescriptor>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_request_size: RequestSizeLimit::try_new(DEFAULT_MAX_BODY_SIZE)
                .unwrap_or_else(|_| unreachable!("default body limit is non-zero")),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            target_host: None,
        }
    }
}

/// Correlation ID assigned to every inbound request
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |id: &Uuid| id.get_version_num() == 7),
)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new RequestId with a v7 UUID
    pub fn generate() -> Self {
        Self::try_new(Uuid::now_v7()).unwrap_or_else(|_| unreachable!("now_v7 yields a v7 UUID"))
    }
}

/// Errors that can occur in the proxy pipeline
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("No target URL in request path")]
    MissingTarget,

    #[error("Malformed percent-encoding in target: {input}")]
    InvalidEncoding { input: String },

    #[error("Invalid target URL '{url}': {reason}")]
    InvalidTargetUrl { url: String, reason: String },

    #[error("Protocol '{protocol}' is not allowed")]
    DisallowedProtocol { protocol: String, url: String },

    #[error("Request too large: {size} bytes (max: {max_size} bytes)")]
    RequestTooLarge {
        size: BodySize,
        max_size: RequestSizeLimit,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Target unreachable: {target}")]
    Unreachable { target: String, reason: String },

    #[error("Unexpected transport error: {0}")]
    Unexpected(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_size_limit_validation() {
        assert!(RequestSizeLimit::try_new(0).is_err());
        assert!(RequestSizeLimit::try_new(1).is_ok());
    }

    #[test]
    fn test_request_id_is_v7() {
        let id = RequestId::generate();
        assert_eq!(id.as_ref().get_version_num(), 7);
        assert!(RequestId::try_new(Uuid::nil()).is_err());
    }

    #[test]
    fn test_default_port_is_normalized_away() {
        let target = TargetDescriptor::new(Scheme::Https, "example.com", Some(443), "/a", None);
        assert_eq!(target.explicit_port(), None);
        assert_eq!(target.port(), 443);
        assert_eq!(target.authority(), "example.com");
    }

    #[test]
    fn test_display_reconstructs_url() {
        let target = TargetDescriptor::new(
            Scheme::Http,
            "localhost",
            Some(8080),
            "/v1/items",
            Some("page=2".to_string()),
        );
        assert_eq!(target.to_string(), "http://localhost:8080/v1/items?page=2");
        assert_eq!(target.authority(), "localhost:8080");
        assert_eq!(target.to_uri().unwrap().port_u16(), Some(8080));
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let target = TargetDescriptor::new(Scheme::Https, "example.com", None, "", None);
        assert_eq!(target.path(), "/");
        assert_eq!(target.to_string(), "https://example.com/");
    }

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(*config.max_request_size.as_ref(), 10 * 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.target_host.is_none());
    }
}
