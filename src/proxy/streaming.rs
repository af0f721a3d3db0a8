//! Streaming relay of target response bodies
//!
//! The target body is polled frame by frame and handed straight to the
//! caller, so memory stays bounded by a single frame. The overall exchange
//! deadline keeps running while the body streams; once headers have been
//! sent the only way to report a failure is to end the stream with an error,
//! which makes the server abort the caller's connection.

use crate::proxy::types::TargetDescriptor;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, Sleep};
use tracing::warn;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure after the response head was already relayed
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("response from {target} exceeded the {timeout:?} deadline mid-stream")]
    Deadline { target: String, timeout: Duration },

    #[error("response stream from {target} failed: {source}")]
    Upstream {
        target: String,
        #[source]
        source: BoxError,
    },
}

pin_project! {
    /// Body that relays a target response under the exchange deadline
    pub struct RelayBody<B> {
        #[pin]
        inner: B,
        #[pin]
        deadline: Sleep,
        timeout: Duration,
        target: String,
        finished: bool,
    }
}

impl<B> RelayBody<B> {
    /// Wrap `inner`; `deadline` is the instant the whole exchange must finish by.
    pub fn new(inner: B, deadline: Instant, timeout: Duration, target: &TargetDescriptor) -> Self {
        Self {
            inner,
            deadline: tokio::time::sleep_until(deadline),
            timeout,
            target: target.to_string(),
            finished: false,
        }
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = RelayError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        if this.deadline.poll(cx).is_ready() {
            *this.finished = true;
            let error = RelayError::Deadline {
                target: this.target.clone(),
                timeout: *this.timeout,
            };
            warn!(error = %error, "Terminating relayed response");
            return Poll::Ready(Some(Err(error)));
        }

        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(Some(Err(e))) => {
                *this.finished = true;
                let error = RelayError::Upstream {
                    target: this.target.clone(),
                    source: e.into(),
                };
                warn!(error = %error, "Terminating relayed response");
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                *this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::url_resolver::UrlResolver;
    use http_body_util::{BodyExt, Full, StreamBody};
    use std::convert::Infallible;

    fn target() -> TargetDescriptor {
        UrlResolver::parse_target("http://upstream.test/stream").unwrap()
    }

    #[tokio::test]
    async fn test_relays_complete_body() {
        let inner = Full::new(Bytes::from_static(b"hello relay"));
        let body = RelayBody::new(
            inner,
            Instant::now() + Duration::from_secs(5),
            Duration::from_secs(5),
            &target(),
        );

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"hello relay");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_terminates_stalled_stream() {
        let stalled = StreamBody::new(futures_util::stream::pending::<
            Result<Frame<Bytes>, Infallible>,
        >());
        let timeout = Duration::from_millis(50);
        let body = RelayBody::new(stalled, Instant::now() + timeout, timeout, &target());

        let err = body.collect().await.unwrap_err();
        assert!(matches!(err, RelayError::Deadline { .. }));
    }

    #[tokio::test]
    async fn test_upstream_error_is_surfaced() {
        let failing = StreamBody::new(futures_util::stream::iter(vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            )),
        ]));
        let mut body = Box::pin(RelayBody::new(
            failing,
            Instant::now() + Duration::from_secs(5),
            Duration::from_secs(5),
            &target(),
        ));

        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from_static(b"partial"));
        let second = body.frame().await.unwrap();
        assert!(matches!(second, Err(RelayError::Upstream { .. })));
        assert!(body.frame().await.is_none());
    }
}
