//! Test utilities for proxy module testing
//!
//! Mock targets run as real Axum servers on ephemeral ports so the forwarder
//! exercises its actual client.

use crate::proxy::types::*;
use axum::{
    body::Body,
    extract::{Path, Request},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

/// Test proxy configuration with a short timeout
pub fn test_proxy_config() -> ProxyConfig {
    ProxyConfig {
        request_timeout: Duration::from_secs(5),
        max_request_size: RequestSizeLimit::try_new(1024 * 1024).expect("1MB is valid"),
        target_host: None,
    }
}

/// Inbound path addressing `url` through the proxy
pub fn proxied_path(url: &str) -> String {
    format!("/{}", urlencoding::encode(url))
}

/// Echo the received request as JSON
pub async fn echo_handler(request: Request) -> Result<impl IntoResponse, StatusCode> {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let headers: serde_json::Map<String, serde_json::Value> = parts
        .headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                serde_json::Value::String(v.to_str().unwrap_or("<binary>").to_string()),
            )
        })
        .collect();

    Ok(Json(serde_json::json!({
        "method": parts.method.to_string(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body_bytes),
    })))
}

/// Respond with the status code given in the path
async fn status_handler(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::OK);
    (status, format!("status {code}"))
}

/// Respond with a hop-by-hop header alongside an ordinary one
async fn hop_by_hop_handler() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert("keep-alive", "timeout=5".parse().expect("static header"));
    headers.insert("proxy-authenticate", "Basic".parse().expect("static header"));
    headers.insert("x-target-marker", "kept".parse().expect("static header"));
    (headers, "ok")
}

/// Router used as the mock target
pub fn mock_target_router(delay: Duration) -> Router {
    Router::new()
        .route("/echo", any(echo_handler))
        .route("/echo/{*rest}", any(echo_handler))
        .route("/status/{code}", get(status_handler))
        .route("/hop", get(hop_by_hop_handler))
        .route(
            "/json",
            get(|| async { Json(serde_json::json!({ "args": { "test": "123" } })) }),
        )
        .route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "Slow response"
            }),
        )
        .route(
            "/large",
            get(|| async { "x".repeat(2 * 1024 * 1024) }),
        )
}

/// Start a mock target and return its address
pub async fn spawn_mock_target() -> SocketAddr {
    spawn_router(mock_target_router(Duration::from_secs(2))).await
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a target that streams chunks until the consumer goes away.
///
/// The returned receiver resolves once the target notices the stream was
/// abandoned.
pub async fn spawn_endless_stream_target() -> (SocketAddr, oneshot::Receiver<()>) {
    let (abandoned_tx, abandoned_rx) = oneshot::channel::<()>();
    let abandoned_tx = std::sync::Arc::new(std::sync::Mutex::new(Some(abandoned_tx)));

    let router = Router::new().route(
        "/stream",
        get(move || {
            let abandoned_tx = abandoned_tx.clone();
            async move {
                let (tx, rx) = mpsc::channel::<Bytes>(1);
                tokio::spawn(async move {
                    loop {
                        if tx.send(Bytes::from_static(b"tick\n")).await.is_err() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                    if let Some(signal) = abandoned_tx.lock().ok().and_then(|mut s| s.take()) {
                        let _ = signal.send(());
                    }
                });
                let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
                });
                Body::from_stream(stream)
            }
        }),
    );

    (spawn_router(router).await, abandoned_rx)
}

/// Address that refuses connections
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

/// Collect a response body as JSON
pub async fn json_body(body: Body) -> serde_json::Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("body should collect");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
