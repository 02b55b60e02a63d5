//! Document server
//!
//! ```text
//!     Client Request
//!     ──────────────▶ static files ─▶ logging ─▶ compression ─▶ security headers
//!                     ─▶ indexing control ─▶ session ─▶ document renderer
//!     Client Response ◀────────────────────────────────────────────────┘
//! ```
//!
//! Configuration comes from the environment (and an optional env file). The
//! process refuses to start when any variable is missing or malformed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use document_server::config::load_config;
use document_server::lifecycle;
use document_server::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "document-server", version, about = "Serve the web application")]
struct Args {
    /// Env file to load before reading the environment (default: ./.env if present).
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Override the listening port.
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_config(args.env_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init(None);
            tracing::error!("Invalid environment variables");
            for field in e.fields() {
                tracing::error!(field = field.field, "{}", field.message);
            }
            if e.fields().is_empty() {
                tracing::error!(error = %e, "Failed to load configuration");
            }
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        config.listener.port = port;
    }

    logging::init(Some(config.mode));
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        bind_address = %config.bind_address(),
        allow_indexing = config.allow_indexing,
        csp_mode = %config.csp.mode,
        monitoring = config.sentry_dsn.is_some(),
        "Configuration loaded"
    );

    if let Err(e) = lifecycle::start(config).await {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
