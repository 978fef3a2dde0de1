//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (tcp/unix)
//!     → server.rs (hyper-util auto builder, PeerAddr attached)
//!     → access_log.rs (one line per request)
//!     → handler.rs (caller's RequestHandler)
//! ```

pub mod access_log;
pub mod handler;
pub mod server;

pub use access_log::{AccessLog, AccessLogLayer, ACCESS_LOG_TARGET};
pub use handler::RequestHandler;
