//! Main proxy service implementation
//!
//! The `ProxyService` wires the three pipeline stages together behind an
//! Axum router:
//!
//! ```rust,ignore
//! use egress_proxy::proxy::{ProxyConfig, ProxyService};
//!
//! let service = ProxyService::new(ProxyConfig::default());
//! let router = service.into_router();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```
//!
//! Per request: resolve the target from the path, collect the bounded
//! inbound body, translate headers and body, then forward and stream the
//! response back. Every stage returns `ProxyResult`, and the error is turned
//! into a JSON response only at the handler boundary.

use crate::proxy::forwarder::Forwarder;
use crate::proxy::headers::paths;
use crate::proxy::middleware_stack::ProxyMiddlewareStack;
use crate::proxy::translator::{translate, InboundBody};
use crate::proxy::types::*;
use crate::proxy::url_resolver::UrlResolver;
use axum::{
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Main proxy service
pub struct ProxyService {
    config: Arc<ProxyConfig>,
    forwarder: Forwarder,
    started_at: Instant,
}

impl ProxyService {
    /// Create a new proxy service
    pub fn new(config: ProxyConfig) -> Self {
        let forwarder = Forwarder::new(config.request_timeout);
        Self {
            config: Arc::new(config),
            forwarder,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Create an Axum router for the proxy service with middleware
    pub fn into_router(self) -> axum::Router {
        self.into_router_with(ProxyMiddlewareStack::default())
    }

    /// Create a router using a custom middleware stack
    pub fn into_router_with(self, middleware: ProxyMiddlewareStack) -> axum::Router {
        let router = axum::Router::new()
            .route(paths::HEALTH, axum::routing::get(health_handler))
            .fallback(proxy_handler)
            .with_state(Arc::new(self));

        middleware.apply_to_router(router)
    }

    /// Work out where an inbound request goes
    fn resolve_target(&self, uri: &http::Uri) -> ProxyResult<TargetDescriptor> {
        match &self.config.target_host {
            Some(base) => UrlResolver::resolve_fixed(base, uri),
            None => UrlResolver::resolve_uri(uri),
        }
    }

    /// Collect the inbound body, rejecting it once it exceeds the limit
    async fn collect_body(&self, body: Body) -> ProxyResult<Bytes> {
        let max_size = self.config.max_request_size;
        Limited::new(body, *max_size.as_ref())
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    ProxyError::RequestTooLarge {
                        size: BodySize::from(*max_size.as_ref() + 1),
                        max_size,
                    }
                } else {
                    ProxyError::Internal(format!("Body collection error: {e}"))
                }
            })
    }
}

/// Axum handler for proxying requests
async fn proxy_handler(
    State(proxy): State<Arc<ProxyService>>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let target = proxy.resolve_target(&parts.uri)?;
    let bytes = proxy.collect_body(body).await?;
    let inbound = InboundBody::classify(&parts.headers, bytes);
    let outbound = translate(&parts.method, &parts.headers, inbound, &target)?;

    proxy.forwarder.forward(outbound).await
}

/// Liveness payload
#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    uptime_seconds: f64,
}

/// Health check handler
async fn health_handler(State(proxy): State<Arc<ProxyService>>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        timestamp: chrono::Utc::now(),
        uptime_seconds: proxy.started_at.elapsed().as_secs_f64(),
    })
}
