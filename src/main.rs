//! `switchyard` binary: serves the demo application.
//!
//! ```text
//! switchyard [--config <file>] [--bind <addr>] [--api-key <key>]
//! ```
//!
//! Flags override the matching config file entries. Runs until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;

use switchyard::config::{read_config, validate_config, AppConfig, ConfigError};
use switchyard::demo::demo_router;
use switchyard::http::server::build_runtime;
use switchyard::observability::{logging, metrics};
use switchyard::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about = "HTTP router demo server")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:4000.
    #[arg(short, long)]
    bind: Option<String>,

    /// API key required by /date.
    #[arg(long)]
    api_key: Option<String>,
}

/// File (or defaults), then flags, then one validation pass over the result.
fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(key) = &cli.api_key {
        config.demo.api_key = Some(key.clone());
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        keep_alive = config.listener.keep_alive,
        gated = config.demo.api_key.is_some(),
        "Configuration loaded"
    );

    let runtime = build_runtime(&config.runtime)?;
    runtime.block_on(async move {
        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(_) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let server = HttpServer::new(demo_router(config.demo.api_key.clone()), config.listener.clone());
        server.serve(shutdown_signal()).await
    })?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C");
        // without a signal handler, keep serving
        std::future::pending::<()>().await;
    }
}
