//! The request handler capability supplied by the caller.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use tower::Service;

use crate::net::PeerAddr;

/// Anything that can turn a request into a response: an `axum::Router`,
/// a `tower::service_fn`, or a hand-written service.
///
/// Both protocols hand the same `Request<Body>` to the handler, with the
/// remote end available as a [`PeerAddr`] extension.
pub trait RequestHandler:
    Service<Request<Body>, Response = Response, Error = Infallible, Future: Send + 'static>
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<S> RequestHandler for S
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
}

/// Attach the peer to a request.
///
/// IP peers are also exposed as `ConnectInfo<SocketAddr>` so axum's
/// extractor keeps working behind either protocol.
pub(crate) fn attach_peer(request: &mut Request<Body>, peer: PeerAddr) {
    let socket_addr = match &peer {
        PeerAddr::Tcp(addr) => Some(*addr),
        PeerAddr::Remote(addr) => addr.parse::<SocketAddr>().ok(),
        PeerAddr::Unix(_) => None,
    };
    if let Some(addr) = socket_addr {
        request.extensions_mut().insert(ConnectInfo(addr));
    }
    request.extensions_mut().insert(peer);
}
