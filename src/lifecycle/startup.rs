//! Ordered startup.
//!
//! Configuration has already been validated by the time `start` runs; this
//! installs the metrics exporter, binds the listener and serves until a
//! shutdown signal arrives.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RuntimeConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Run the server with the built-in document renderer until shutdown.
pub async fn start(config: RuntimeConfig) -> Result<(), StartupError> {
    if let Some(address) = config.metrics_address {
        metrics::init_exporter(address)?;
    }

    let address = config.bind_address();
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::with_defaults(config);
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
