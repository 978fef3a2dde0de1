//! Server bootstrap.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → redirect stdout/stderr into the log file (optional)
//!     → Listener::bind
//!     → protocol resolution
//!     → signal handlers installed, "Starting server"
//!     → dispatcher.rs (spawned accept loop) racing the first signal
//!     → signal: close listener, exit(0)
//! ```
//!
//! # Design Decisions
//! - The listener is owned by the accept loop; the signal path closes it
//!   through the shared [`Shutdown`] instead of touching it directly
//! - Shutdown is immediate: in-flight requests are not drained

mod dispatcher;

use std::convert::Infallible;
use std::future::Future;
use std::io;

use crate::config::{ConfigError, Protocol, ServerConfig};
use crate::http::RequestHandler;
use crate::lifecycle::{Shutdown, ShutdownSignal, Signals};
use crate::net::{Listener, ListenerError, LocalAddr};
use crate::observability::logging;
use crate::observability::redirect::{redirect_std_streams, RedirectError};

/// Everything that can stop the server from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("unknown protocol {0}")]
    UnknownProtocol(String),
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
    #[error("accept loop panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Serve `handler` with configuration from the command line, environment
/// and config file. Only returns on a startup or serve error; a shutdown
/// signal exits the process with status 0.
pub async fn serve<H: RequestHandler>(handler: H) -> Result<Infallible, ServeError> {
    let config = ServerConfig::from_args()?;
    serve_with_config(config, handler).await
}

/// Like [`serve`] with an already-loaded configuration.
pub async fn serve_with_config<H: RequestHandler>(
    config: ServerConfig,
    handler: H,
) -> Result<Infallible, ServeError> {
    // ANSI colours only make sense on a terminal, never in the log file.
    if logging::try_init(config.logfile.is_none()).is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
    Server::new(config, handler).start().await?.run().await
}

/// A server that has not bound its listener yet.
pub struct Server<H> {
    config: ServerConfig,
    handler: H,
}

impl<H: RequestHandler> Server<H> {
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self { config, handler }
    }

    /// Redirect output, bind the listener and resolve the protocol.
    ///
    /// An unknown protocol is detected after binding; the listener is
    /// closed again before the error is returned.
    pub async fn start(self) -> Result<StartedServer<H>, ServeError> {
        if let Some(path) = &self.config.logfile {
            redirect_std_streams(path)?;
        }

        let shutdown = Shutdown::new();
        let listener = Listener::bind(&self.config, shutdown.clone()).await?;

        let protocol: Protocol = match self.config.proto.parse() {
            Ok(protocol) => protocol,
            Err(_) => {
                drop(listener);
                return Err(ServeError::UnknownProtocol(self.config.proto));
            }
        };

        Ok(StartedServer {
            config: self.config,
            listener,
            protocol,
            handler: self.handler,
            shutdown,
        })
    }
}

/// A bound server, ready to accept connections.
pub struct StartedServer<H> {
    config: ServerConfig,
    listener: Listener,
    protocol: Protocol,
    handler: H,
    shutdown: Shutdown,
}

impl<H: RequestHandler> StartedServer<H> {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<LocalAddr> {
        self.listener.local_addr()
    }

    /// Serve until SIGINT or SIGTERM, then exit the process with status 0.
    pub async fn run(self) -> Result<Infallible, ServeError> {
        let signals = Signals::install().map_err(ServeError::Signal)?;
        self.serve_until(signals.recv()).await?;
        std::process::exit(0)
    }

    /// Serve until `signal` resolves, then close the listener and return
    /// the signal. The process keeps running; [`StartedServer::run`] is
    /// the variant that exits.
    pub async fn serve_until<F>(self, signal: F) -> Result<ShutdownSignal, ServeError>
    where
        F: Future<Output = ShutdownSignal>,
    {
        let address = self.listener.local_addr().map_or_else(
            |_| self.config.addr.clone(),
            |addr| addr.to_string(),
        );
        tracing::info!(
            socket = %self.config.socket,
            address = %address,
            protocol = %self.protocol,
            "Starting server"
        );

        let mut serving = tokio::spawn(dispatcher::run(self.listener, self.protocol, self.handler));

        let signal = tokio::select! {
            signal = signal => signal,
            stopped = &mut serving => return Err(ServeError::Listener(stopped?)),
        };

        tracing::info!("Caught signal {signal}: shutting down.");
        self.shutdown.trigger();
        match serving.await? {
            ListenerError::Closed => {}
            e => tracing::debug!(error = %e, "Accept loop ended before close"),
        }
        Ok(signal)
    }
}
