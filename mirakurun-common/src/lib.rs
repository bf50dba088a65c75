//! Mirakurun Exporter Common Library
//!
//! Shared building blocks for talking to a Mirakurun tuner server:
//!
//! - [`endpoint`] - Upstream endpoint resolved from `MIRAKURUN_*` variables
//! - [`client`] - HTTP client for the `/api/*` namespaces
//! - [`snapshot`] - Typed, leniently decoded `status` and `version` documents
//! - [`config`] - Logging settings
//! - [`error`] - Error types

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod snapshot;

// Re-export commonly used types at the crate root
pub use client::ApiClient;
pub use config::{LogFormat, LoggingConfig};
pub use endpoint::EndpointConfig;
pub use error::{Error, Result};
pub use snapshot::{StatusSnapshot, VersionSnapshot, decode_object};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Example
///
/// ```ignore
/// use mirakurun_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
