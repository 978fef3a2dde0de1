//! Structured logging.
//!
//! Records go to stderr through a `tracing-subscriber` fmt layer. Writing
//! to the stderr descriptor (rather than a handle captured at startup) is
//! what lets [`super::redirect`] move every record, access log included,
//! into the log file.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::http::ACCESS_LOG_TARGET;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Fails if the host
/// application already installed a subscriber.
pub fn try_init(ansi: bool) -> Result<(), TryInitError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(env_filter(directives.as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(ansi))
        .try_init()
}

/// Filter built from `RUST_LOG`-style directives.
///
/// Access lines pass at INFO whatever the directives say.
pub fn env_filter(directives: Option<&str>) -> EnvFilter {
    let filter = directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));
    match format!("{ACCESS_LOG_TARGET}=info").parse() {
        Ok(access) => filter.add_directive(access),
        Err(_) => filter,
    }
}
