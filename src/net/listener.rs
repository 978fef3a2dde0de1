//! Listening sockets.
//!
//! # Responsibilities
//! - Bind a TCP or Unix stream socket from the configured kind and address
//! - Accept incoming connections until the shutdown coordinator fires
//! - Remove the Unix socket file once the listener is closed

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use nix::sys::socket::{setsockopt, sockopt};
use tokio::net::{TcpListener, TcpSocket, UnixListener};

use crate::config::{ServerConfig, SocketKind};
use crate::lifecycle::Shutdown;
use crate::net::connection::{Connection, PeerAddr};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Socket kind is neither `tcp` nor `unix`.
    #[error("unknown network {0}")]
    UnknownNetwork(String),
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),
    /// The listener was closed by the shutdown path.
    #[error("listener closed")]
    Closed,
}

/// Address a [`Listener`] is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for LocalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalAddr::Tcp(addr) => write!(f, "{addr}"),
            LocalAddr::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

enum Inner {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

/// A bound listening socket.
///
/// Accepting stops for good once the [`Shutdown`] it was bound with is
/// triggered; dropping the listener closes the socket.
pub struct Listener {
    inner: Inner,
    shutdown: Shutdown,
}

impl Listener {
    /// Bind to the configured socket kind and address.
    pub async fn bind(config: &ServerConfig, shutdown: Shutdown) -> Result<Self, ListenerError> {
        let kind: SocketKind = config
            .socket
            .parse()
            .map_err(|_| ListenerError::UnknownNetwork(config.socket.clone()))?;

        let bind_error = |source| ListenerError::Bind {
            addr: config.addr.clone(),
            source,
        };

        let inner = match kind {
            SocketKind::Tcp => {
                let listener = bind_tcp(&config.addr).await.map_err(bind_error)?;
                Inner::Tcp(listener)
            }
            SocketKind::Unix => {
                let path = PathBuf::from(&config.addr);
                let listener = UnixListener::bind(&path).map_err(bind_error)?;
                Inner::Unix { listener, path }
            }
        };

        let listener = Self { inner, shutdown };
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            socket = %kind,
            address = %local_addr,
            "Listener bound"
        );

        Ok(listener)
    }

    /// Accept a new connection.
    ///
    /// Returns [`ListenerError::Closed`] as soon as the shutdown is
    /// triggered, including while waiting for a client.
    pub async fn accept(&self) -> Result<(Connection, PeerAddr), ListenerError> {
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(ListenerError::Closed),
            accepted = self.accept_inner() => accepted.map_err(ListenerError::Accept),
        }
    }

    async fn accept_inner(&self) -> io::Result<(Connection, PeerAddr)> {
        match &self.inner {
            Inner::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok((Connection::Tcp(stream), PeerAddr::Tcp(unmap_ipv4(addr))))
            }
            Inner::Unix { listener, .. } => {
                let (stream, addr) = listener.accept().await?;
                let peer = PeerAddr::Unix(addr.as_pathname().map(|p| p.to_path_buf()));
                Ok((Connection::Unix(stream), peer))
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<LocalAddr> {
        match &self.inner {
            Inner::Tcp(listener) => listener.local_addr().map(LocalAddr::Tcp),
            Inner::Unix { path, .. } => Ok(LocalAddr::Unix(path.clone())),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Inner::Unix { path, .. } = &self.inner {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}

const LISTEN_BACKLOG: u32 = 1024;

/// Bind a TCP listener. `":5000"` listens on every interface: dual-stack
/// `[::]:5000` where IPv6 is available, `0.0.0.0:5000` otherwise.
async fn bind_tcp(addr: &str) -> io::Result<TcpListener> {
    let Some(port) = addr.strip_prefix(':') else {
        return TcpListener::bind(addr).await;
    };
    let port: u16 = port.parse().map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("invalid port in {addr}"))
    })?;

    match bind_dual_stack(port) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "IPv6 unavailable, listening on IPv4 only");
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
        }
    }
}

/// IPv4 clients of a dual-stack listener show up as `::ffff:a.b.c.d`.
fn unmap_ipv4(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => SocketAddr::from((v4, v6.port())),
            None => addr,
        },
        SocketAddr::V4(_) => addr,
    }
}

fn bind_dual_stack(port: u16) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v6()?;
    // accept IPv4 clients too, whatever net.ipv6.bindv6only says
    setsockopt(&socket, sockopt::Ipv6V6Only, &false)?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)))?;
    socket.listen(LISTEN_BACKLOG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn config(socket: &str, addr: &str) -> ServerConfig {
        ServerConfig {
            socket: socket.into(),
            addr: addr.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn port_only_listens_on_ipv4_and_ipv6() {
        let listener = Listener::bind(&config("tcp", ":0"), Shutdown::new())
            .await
            .unwrap();
        let LocalAddr::Tcp(addr) = listener.local_addr().unwrap() else {
            panic!("expected a tcp address");
        };
        let port = addr.port();

        let client = tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, port))
            .await
            .expect("IPv4 clients should reach a port-only listener");
        let (_conn, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, PeerAddr::Tcp(client.local_addr().unwrap()));

        // hosts without an IPv6 loopback fall back to IPv4 only
        if std::net::TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).is_ok() {
            tokio::net::TcpStream::connect((Ipv6Addr::LOCALHOST, port))
                .await
                .expect("IPv6 clients should reach a port-only listener");
        }
    }

    #[test]
    fn mapped_ipv4_peers_are_unmapped() {
        let mapped: SocketAddr = "[::ffff:127.0.0.1]:9999".parse().unwrap();
        assert_eq!(unmap_ipv4(mapped), "127.0.0.1:9999".parse::<SocketAddr>().unwrap());
        let v6: SocketAddr = "[::1]:9999".parse().unwrap();
        assert_eq!(unmap_ipv4(v6), v6);
    }

    #[tokio::test]
    async fn bad_port_is_a_bind_error() {
        let result = Listener::bind(&config("tcp", ":http-alt"), Shutdown::new()).await;
        assert!(matches!(result, Err(ListenerError::Bind { .. })));
    }

    #[tokio::test]
    async fn unknown_network_is_rejected() {
        let result = Listener::bind(&config("udp", ":0"), Shutdown::new()).await;
        assert!(matches!(result, Err(ListenerError::UnknownNetwork(n)) if n == "udp"));
    }

    #[tokio::test]
    async fn bind_conflict_is_an_error() {
        let first = Listener::bind(&config("tcp", "127.0.0.1:0"), Shutdown::new())
            .await
            .unwrap();
        let LocalAddr::Tcp(addr) = first.local_addr().unwrap() else {
            panic!("expected a tcp address");
        };

        let second = Listener::bind(&config("tcp", &addr.to_string()), Shutdown::new()).await;
        assert!(matches!(second, Err(ListenerError::Bind { .. })));
    }

    #[tokio::test]
    async fn invalid_address_is_an_error() {
        let result = Listener::bind(&config("tcp", "not an address"), Shutdown::new()).await;
        assert!(matches!(result, Err(ListenerError::Bind { .. })));
    }

    #[tokio::test]
    async fn tcp_accepts_with_peer_address() {
        let listener = Listener::bind(&config("tcp", "127.0.0.1:0"), Shutdown::new())
            .await
            .unwrap();
        let LocalAddr::Tcp(addr) = listener.local_addr().unwrap() else {
            panic!("expected a tcp address");
        };

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let local = stream.local_addr().unwrap();
            stream.write_all(b"ping").await.unwrap();
            local
        });

        let (mut conn, peer) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(peer, PeerAddr::Tcp(client.await.unwrap()));
    }

    #[tokio::test]
    async fn unix_socket_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.sock");
        let listener = Listener::bind(&config("unix", path.to_str().unwrap()), Shutdown::new())
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(listener.local_addr().unwrap(), LocalAddr::Unix(path.clone()));

        let connect_path = path.clone();
        let client = tokio::spawn(async move { tokio::net::UnixStream::connect(connect_path).await });
        let (_conn, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, PeerAddr::Unix(None));
        client.await.unwrap().unwrap();

        drop(listener);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn shutdown_interrupts_pending_accept() {
        let shutdown = Shutdown::new();
        let listener = Listener::bind(&config("tcp", "127.0.0.1:0"), shutdown.clone())
            .await
            .unwrap();

        let pending = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("accept should be interrupted")
            .unwrap();
        assert!(matches!(result, Err(ListenerError::Closed)));
    }
}
