//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig (socket, addr)
//!     → listener.rs (bind tcp/unix, accept until shutdown)
//!     → connection.rs (Connection stream + PeerAddr)
//!     → Hand off to the protocol dispatcher
//! ```

pub mod connection;
pub mod listener;

pub use connection::{Connection, ConnectionId, PeerAddr};
pub use listener::{Listener, ListenerError, LocalAddr};
