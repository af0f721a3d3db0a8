//! Egress Proxy - a single-hop HTTP/HTTPS forwarding proxy
//!
//! Callers address a target by percent-encoding its absolute URL into the
//! request path. The proxy decodes it, reissues the request from its own
//! address and streams the target's response back.

pub mod application;
pub mod config;
pub mod error;
pub mod proxy;

pub use application::Application;
pub use error::{Error, Result};
