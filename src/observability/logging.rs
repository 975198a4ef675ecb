//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide tracing subscriber for the binary
//! - Resolve the effective filter from `RUST_LOG`, `LOG_VERBOSE` and config
//!
//! # Design Decisions
//! - JSON format for machines, pretty format for humans
//! - `RUST_LOG` always wins; `LOG_VERBOSE` only raises the default to `trace`
//! - Never called from library code paths

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Environment variable that turns on verbose diagnostics.
pub const LOG_VERBOSE_ENV: &str = "LOG_VERBOSE";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },
    #[error("a global subscriber is already installed")]
    AlreadyInstalled,
}

/// Default directive when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig, verbose: bool) -> String {
    if verbose {
        "trace".to_string()
    } else {
        config.log_level.clone()
    }
}

fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let verbose = std::env::var_os(LOG_VERBOSE_ENV).is_some();
    let directive = default_directive(config, verbose);
    EnvFilter::try_new(&directive).map_err(|e| LoggingError::Filter {
        filter: directive,
        reason: e.to_string(),
    })
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let location = config.include_code_location;

    let installed = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
    };

    installed.map_err(|_| LoggingError::AlreadyInstalled)
}
