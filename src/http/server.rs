//! Direct protocol: HTTP spoken straight over the accepted connection.
//!
//! # Responsibilities
//! - Drive HTTP/1.1 and HTTP/2 (with upgrades) via hyper-util's auto builder
//! - Attach the connection's peer to every request
//! - Pass requests to the access-logged handler

use axum::body::Body;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tower::ServiceExt;

use crate::http::handler::{attach_peer, RequestHandler};
use crate::net::PeerAddr;

/// Serve HTTP on one connection until the client goes away.
///
/// Connection-level errors (malformed requests, resets) are logged at
/// debug level and end only this connection.
pub async fn serve_connection<IO, H>(io: IO, peer: PeerAddr, handler: H)
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: RequestHandler,
{
    let service = service_fn(move |request: Request<Incoming>| {
        let mut request = request.map(Body::new);
        attach_peer(&mut request, peer.clone());
        handler.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    if let Err(e) = builder
        .serve_connection_with_upgrades(TokioIo::new(io), service)
        .await
    {
        tracing::debug!(error = %e, "HTTP connection closed with error");
    }
}
