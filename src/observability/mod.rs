//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (lifecycle lines, access log)
//!     → logging.rs (fmt layer → stderr)
//!     → redirect.rs (stdout/stderr → log file, when configured)
//! ```

pub mod logging;
pub mod redirect;
