//! Configuration loading from flags, environment and disk.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser};
use serde::Deserialize;

use crate::config::schema::{ServerConfig, DEFAULT_ADDR, DEFAULT_PROTO, DEFAULT_SOCKET};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Args(#[from] clap::Error),
}

/// Server options as flags, each with an environment fallback.
///
/// Flatten this into a host binary's own `clap` parser to expose the
/// server options next to its own.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Configuration file (empty for none)
    #[arg(long, env = "HTTPSERV_CONFIG", value_name = "PATH")]
    pub config: Option<OsString>,

    /// Network socket to use (tcp/unix)
    #[arg(long, env = "HTTPSERV_SOCKET")]
    pub socket: Option<String>,

    /// Address to listen / socket filename
    #[arg(long, env = "HTTPSERV_ADDR")]
    pub addr: Option<String>,

    /// Protocol to use (http/fcgi)
    #[arg(long, env = "HTTPSERV_PROTO")]
    pub proto: Option<String>,

    /// Log file path (empty for none)
    #[arg(long, env = "HTTPSERV_LOGFILE", value_name = "PATH")]
    pub logfile: Option<OsString>,
}

#[derive(Debug, Parser)]
#[command(name = "httpserv", version, about = "Serve HTTP or FastCGI on a TCP or Unix socket")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

impl ServeArgs {
    /// Parse flags (and environment fallbacks) from an argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Cli::try_parse_from(args)?.serve)
    }
}

/// Keys accepted in the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub socket: Option<String>,
    pub addr: Option<String>,
    pub proto: Option<String>,
    pub logfile: Option<PathBuf>,
}

impl FileConfig {
    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ServerConfig {
    /// Parse the process arguments and build the layered configuration.
    ///
    /// `--help` and `--version` surface as [`ConfigError::Args`]; callers
    /// usually want `err.exit()` for those.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = Cli::try_parse()?.serve;
        Self::load(args)
    }

    /// Layer parsed flags over the config file (if any) and the defaults.
    ///
    /// An empty `config` or `logfile` means none; an explicitly empty
    /// `logfile` flag also overrides the file's.
    pub fn load(args: ServeArgs) -> Result<Self, ConfigError> {
        let config_path = args.config.and_then(non_empty_path);
        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        Ok(Self {
            socket: args
                .socket
                .or(file.socket)
                .unwrap_or_else(|| DEFAULT_SOCKET.to_string()),
            addr: args
                .addr
                .or(file.addr)
                .unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            proto: args
                .proto
                .or(file.proto)
                .unwrap_or_else(|| DEFAULT_PROTO.to_string()),
            logfile: match args.logfile {
                Some(logfile) => non_empty_path(logfile),
                None => file.logfile.and_then(non_empty_path),
            },
            config_path,
        })
    }
}

fn non_empty_path(path: impl Into<PathBuf>) -> Option<PathBuf> {
    let path = path.into();
    (!path.as_os_str().is_empty()).then_some(path)
}
