//! Forwarding pipeline
//!
//! Three stages run per inbound request:
//! - URL resolution: decode the target URL carried in the path
//! - Translation: sanitize headers, rewrite `host`, settle the body
//! - Forwarding: issue the outbound exchange and stream the response back

pub mod error_response;
pub mod forwarder;
pub mod headers;
pub mod middleware;
pub mod middleware_stack;
pub mod service;
pub mod streaming;
pub mod translator;
pub mod types;
pub mod url_resolver;

#[cfg(test)]
mod test_utils;



pub use service::ProxyService;
pub use types::{ProxyConfig, ProxyError, ProxyResult, TargetDescriptor};
