//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! explicit flags / HTTPSERV_* environment (clap)
//!     → loader.rs (ServeArgs, optional TOML file underneath)
//!     → ServerConfig (immutable, passed by value into the server)
//! ```
//!
//! # Design Decisions
//! - Precedence: flag > environment > config file > built-in default
//! - Socket kind and protocol stay as raw names here; they are parsed
//!   where they are used (listener bind, dispatch) so unknown values fail
//!   late with a precise error

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, FileConfig, ServeArgs};
pub use schema::{Protocol, ServerConfig, SocketKind};
