//! Configuration schema definitions.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SOCKET: &str = "tcp";
pub const DEFAULT_ADDR: &str = ":5000";
pub const DEFAULT_PROTO: &str = "http";

/// Process configuration for the server.
///
/// Built once at startup (see [`crate::config::loader`]) and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Config file this value was layered over, if any.
    pub config_path: Option<PathBuf>,
    /// Socket kind name (`tcp` or `unix`).
    pub socket: String,
    /// Bind address (`host:port`, `:port`) or socket path.
    pub addr: String,
    /// Protocol name (`http` or `fcgi`).
    pub proto: String,
    /// When set, stdout and stderr are redirected to this file.
    pub logfile: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            socket: DEFAULT_SOCKET.to_string(),
            addr: DEFAULT_ADDR.to_string(),
            proto: DEFAULT_PROTO.to_string(),
            logfile: None,
        }
    }
}

/// Kind of stream socket to listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Tcp,
    Unix,
}

/// Returned when a socket kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSocketKind(pub String);

impl FromStr for SocketKind {
    type Err = UnknownSocketKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(SocketKind::Tcp),
            "unix" => Ok(SocketKind::Unix),
            other => Err(UnknownSocketKind(other.to_string())),
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Tcp => f.write_str("tcp"),
            SocketKind::Unix => f.write_str("unix"),
        }
    }
}

/// Wire protocol spoken on accepted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Plain HTTP straight over the connection.
    Http,
    /// FastCGI responder, for running behind a front-end web server.
    Fcgi,
}

/// Returned when a protocol name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "fcgi" => Ok(Protocol::Fcgi),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Fcgi => f.write_str("fcgi"),
        }
    }
}
