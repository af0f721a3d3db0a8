//! Middleware stack builder for clean composition

use crate::proxy::error_response::panic_response;
use crate::proxy::middleware::*;
use axum::{middleware::from_fn, Router};
use tower_http::catch_panic::CatchPanicLayer;

/// Builder for composing the proxy middleware stack
#[derive(Clone, Debug)]
pub struct ProxyMiddlewareStack {
    enable_logging: bool,
}

impl Default for ProxyMiddlewareStack {
    fn default() -> Self {
        Self {
            enable_logging: true,
        }
    }
}

impl ProxyMiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to disable request logging
    pub fn disable_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    /// Apply the complete middleware stack to a router
    ///
    /// Order, outer to inner:
    /// 1. Request ID generation
    /// 2. Logging (inside the request span)
    /// 3. Panic capture, so a faulting handler still yields a JSON 500
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = router.layer(CatchPanicLayer::custom(panic_response));
        let router = if self.enable_logging {
            router.layer(from_fn(logging_middleware))
        } else {
            router
        };
        router.layer(from_fn(request_id_middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::error_response::ErrorResponse;
    use crate::proxy::headers::X_PROXY_REQUEST_ID;
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    async fn panicking_handler() -> StatusCode {
        panic!("handler fault")
    }

    #[tokio::test]
    async fn test_panic_becomes_json_500() {
        let router = Router::new().route("/boom", axum::routing::get(panicking_handler));
        let app = ProxyMiddlewareStack::new().apply_to_router(router);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/boom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(X_PROXY_REQUEST_ID));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.error, "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_stack_without_logging() {
        let router = Router::new().route("/ok", axum::routing::get(|| async { StatusCode::OK }));
        let app = ProxyMiddlewareStack::new()
            .disable_logging()
            .apply_to_router(router);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_PROXY_REQUEST_ID));
    }
}
