//! Bootstrap helper for request-serving processes.
//!
//! Binds one listener (TCP or Unix socket), wraps a caller-supplied handler
//! with access logging, speaks plain HTTP or FastCGI on every accepted
//! connection, and exits with status 0 on SIGINT or SIGTERM.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpserv::ServeError> {
//!     let app = Router::new().route("/", get(|| async { "hello" }));
//!     httpserv::serve(app).await?;
//!     Ok(())
//! }
//! ```

// Core subsystems
pub mod config;
pub mod fcgi;
pub mod http;
pub mod net;
pub mod server;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServerConfig;
pub use http::{AccessLogLayer, RequestHandler};
pub use net::PeerAddr;
pub use server::{serve, serve_with_config, ServeError, Server, StartedServer};
