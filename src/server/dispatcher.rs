//! Accept loop: one task per connection, speaking the configured protocol.

use std::io;

use nix::errno::Errno;
use tracing::Instrument;

use crate::config::Protocol;
use crate::fcgi;
use crate::http::server::serve_connection;
use crate::http::{AccessLog, RequestHandler};
use crate::net::{ConnectionId, Listener, ListenerError};
use crate::resilience::AcceptBackoff;

/// Accept connections until the listener fails or is closed.
///
/// Owns the listener, so it is dropped (and a Unix socket file removed)
/// when this returns. Connection tasks already running are not awaited.
pub(crate) async fn run<H>(listener: Listener, protocol: Protocol, handler: H) -> ListenerError
where
    H: RequestHandler,
{
    let handler = AccessLog::new(handler);
    let mut backoff = AcceptBackoff::default();

    loop {
        let (connection, peer) = match listener.accept().await {
            Ok(accepted) => {
                backoff.reset();
                accepted
            }
            Err(ListenerError::Accept(e)) if is_transient(&e) => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Accept failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(e) => return e,
        };

        let id = ConnectionId::new();
        tracing::debug!(connection_id = %id, peer = %peer, "Connection accepted");

        let handler = handler.clone();
        let span = tracing::debug_span!("connection", id = %id);
        tokio::spawn(
            async move {
                match protocol {
                    Protocol::Http => serve_connection(connection, peer, handler).await,
                    Protocol::Fcgi => fcgi::serve_connection(connection, handler).await,
                }
                tracing::debug!("Connection closed");
            }
            .instrument(span),
        );
    }
}

/// Errors after which accepting again can succeed.
fn is_transient(e: &io::Error) -> bool {
    use io::ErrorKind::*;

    if matches!(
        e.kind(),
        ConnectionAborted | ConnectionReset | ConnectionRefused | Interrupted | WouldBlock
    ) {
        return true;
    }
    matches!(
        e.raw_os_error().map(Errno::from_raw),
        Some(Errno::EMFILE | Errno::ENFILE | Errno::ENOBUFS | Errno::ENOMEM)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_exhaustion_is_transient() {
        assert!(is_transient(&io::Error::from_raw_os_error(Errno::EMFILE as i32)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(!is_transient(&io::Error::from_raw_os_error(Errno::EBADF as i32)));
        assert!(!is_transient(&io::Error::new(io::ErrorKind::Other, "boom")));
    }
}
