//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! accept() fails with a transient error (EMFILE, ECONNABORTED, ...)
//!     → backoff.rs (sleep 5ms, 10ms, ... up to 1s, with jitter)
//!     → accept again
//! ```

pub mod backoff;

pub use backoff::AcceptBackoff;
