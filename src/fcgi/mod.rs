//! Gateway protocol: FastCGI responder.
//!
//! # Data Flow
//! ```text
//! Connection from the front-end web server
//!     → codec.rs (record framing)
//!     → conn.rs (per-request state, management records)
//!     → params.rs + request.rs (CGI params → Request<Body>)
//!     → access-logged handler
//!     → request.rs (Response → Status line + headers) → FCGI_STDOUT
//! ```

pub mod codec;
pub mod conn;
pub mod params;
pub mod record;
pub mod request;

pub use codec::RecordCodec;
pub use conn::serve_connection;
pub use record::{Record, RecordType};

/// Protocol-level errors; each one ends only the connection it came from.
#[derive(Debug, thiserror::Error)]
pub enum FcgiError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unsupported FastCGI version {0}")]
    Version(u8),
    #[error("record content of {0} bytes exceeds 65535")]
    ContentTooLong(usize),
    #[error("malformed {0} record")]
    Malformed(&'static str),
    #[error("malformed name-value pair")]
    Params,
}
