//! Demo server.
//!
//! ```text
//! httpserv --socket unix --addr /run/app.sock --proto fcgi --logfile /var/log/app.log
//! ```
//!
//! Serves a greeting on `/` and echoes request bodies on `/echo`.

use std::time::Duration;

use axum::{
    body::Bytes,
    routing::{any, get},
    Router,
};
use httpserv::config::ConfigError;
use httpserv::ServeError;
use tower_http::timeout::TimeoutLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[allow(deprecated)]
fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "hello from httpserv\n" }))
        .route("/echo", any(|body: Bytes| async move { body }))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match httpserv::serve(app()).await {
        Ok(never) => match never {},
        // --help, --version and bad flags
        Err(ServeError::Config(ConfigError::Args(e))) => e.exit(),
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            Err(e.into())
        }
    }
}
