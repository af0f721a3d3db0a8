//! Outbound forwarding with streamed response relay
//!
//! The forwarder owns the pooled HTTP/HTTPS client. It issues one outbound
//! exchange per translated request and returns as soon as the target's
//! response head arrives; the body is relayed lazily through [`RelayBody`].

use crate::proxy::headers::strip_response_hop_by_hop;
use crate::proxy::streaming::RelayBody;
use crate::proxy::translator::OutboundRequest;
use crate::proxy::types::*;
use axum::body::Body;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Type alias for the outbound client
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Build the pooled client used for every target.
///
/// Plain `http` and TLS `https` targets share one pool; TLS trust comes from
/// the bundled webpki roots.
pub fn build_client() -> HttpClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Issues outbound requests and relays responses
#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_client(),
            timeout,
        }
    }

    /// Forward `outbound` and return the relayed response.
    ///
    /// Any status the target answers with is returned as-is; only transport
    /// failures become errors. Dropping the returned future or the response
    /// body aborts the outbound connection.
    pub async fn forward(&self, outbound: OutboundRequest) -> ProxyResult<Response<Body>> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let OutboundRequest {
            method,
            target,
            headers,
            body,
        } = outbound;

        let mut request = Request::builder()
            .method(method)
            .uri(target.to_uri()?)
            .body(Full::new(body))
            .map_err(|e| ProxyError::Internal(format!("Failed to build outbound request: {e}")))?;
        *request.headers_mut() = headers;

        debug!(upstream = %target, "Forwarding request");

        let response = tokio::time::timeout_at(deadline, self.client.request(request))
            .await
            .map_err(|_| ProxyError::Timeout(self.timeout))?
            .map_err(|e| classify_client_error(&target, &e))?;

        debug!(
            upstream = %target,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Response head received"
        );

        let (mut parts, incoming) = response.into_parts();
        strip_response_hop_by_hop(&mut parts.headers);

        let relay = RelayBody::new(incoming, deadline, self.timeout, &target);
        Ok(Response::from_parts(parts, Body::new(relay)))
    }
}

/// Map a client failure onto the transport taxonomy.
///
/// Connect-phase failures (DNS resolution, refused, unroutable) mean the
/// target is unreachable; everything after the connection was established
/// is unexpected.
fn classify_client_error(
    target: &TargetDescriptor,
    error: &hyper_util::client::legacy::Error,
) -> ProxyError {
    let reason = error_chain(error);
    if error.is_connect() {
        warn!(upstream = %target, reason = %reason, "Target unreachable");
        ProxyError::Unreachable {
            target: target.to_string(),
            reason,
        }
    } else {
        warn!(upstream = %target, reason = %reason, "Outbound exchange failed");
        ProxyError::Unexpected(reason)
    }
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
