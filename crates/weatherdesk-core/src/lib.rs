//! Application layer for WeatherDesk: configuration, error hierarchy,
//! and construction of the shared weather client.

pub mod app;
pub mod config;
pub mod error;

pub use app::App;
pub use config::{CacheConfig, Config, LocationConfig, ProviderConfig, ValidationResult};
pub use error::{AppError, ConfigError};

/// Initialize logging
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`.
pub fn init() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| AppError::Other(anyhow::anyhow!("Failed to install tracing subscriber: {}", e)))?;

    tracing::info!("WeatherDesk core initialized");
    Ok(())
}
