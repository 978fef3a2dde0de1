//! Access logging middleware.
//!
//! One INFO record per request on the `httpserv::access` target, written
//! before the inner service sees the request:
//!
//! ```text
//! 127.0.0.1:9999 GET /foo?x=1
//! ```
//!
//! The record goes through `tracing`; a subscriber that fails to write it
//! drops the line and the request proceeds regardless.

use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use crate::net::PeerAddr;

/// Target of access log records, for filtering with `RUST_LOG`.
pub const ACCESS_LOG_TARGET: &str = "httpserv::access";

/// Layer that wraps a service in [`AccessLog`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogLayer;

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLog::new(inner)
    }
}

/// Logs every request, then hands it to the inner service unchanged.
#[derive(Debug, Clone)]
pub struct AccessLog<S> {
    inner: S,
}

impl<S> AccessLog<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, B> Service<Request<B>> for AccessLog<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let peer = request
            .extensions()
            .get::<PeerAddr>()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        tracing::info!(target: ACCESS_LOG_TARGET, "{} {} {}", peer, request.method(), target);

        self.inner.call(request)
    }
}
