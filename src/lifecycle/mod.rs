//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → first one wins
//!
//! Shutdown (shutdown.rs):
//!     Signal received → log → trigger (closes listener) → exit(0)
//! ```
//!
//! # Design Decisions
//! - Handlers are installed only after the listener is bound
//! - No draining: the pending accept is interrupted, the process exits

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{ShutdownSignal, Signals};
