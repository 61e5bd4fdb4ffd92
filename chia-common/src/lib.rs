//! Chia Exporter Common Library
//!
//! This crate provides shared types and utilities for Chia metrics exporters:
//!
//! - [`snapshot`] - Domain data fetched from backends (`DomainSnapshot`, `PlotRecord`, `SourceKind`)
//! - [`metric`] - Exposition-agnostic metric families (`MetricFamily`, `Sample`)
//! - [`chia_config`] - Backend discovery from the node's `config.yaml`
//! - [`config`] - Logging configuration shared by exporter config files
//! - [`error`] - Error types, including the per-source `SourceError`

pub mod chia_config;
pub mod config;
pub mod error;
pub mod metric;
pub mod snapshot;

// Re-export commonly used types at the crate root
pub use chia_config::{
    CHIA_ROOT_ENV, ChiaConfig, ServiceEndpoint, TlsFiles, default_root_path, default_rpc_port,
};
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result, SourceError};
pub use metric::{MetricError, MetricFamily, Sample, is_valid_name};
pub use snapshot::{DomainSnapshot, PlotRecord, SourceKind};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over `config.level` when set.
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
