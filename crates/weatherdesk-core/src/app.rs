use std::sync::Arc;
use weatherdesk_weather::{GeoLocation, WeatherCache, WeatherClient, WeatherError};

use crate::{AppError, Config};

/// Application state: configuration plus the shared cache and client.
///
/// Everything that talks to the provider receives these handles from here
/// instead of reaching for process-wide instances.
pub struct App {
    config: Arc<Config>,
    cache: Arc<WeatherCache>,
    client: Arc<WeatherClient>,
}

impl App {
    /// Load and validate the user configuration, then build the application
    pub fn new() -> Result<Self, AppError> {
        let (config, _) = Config::load_validated()?;
        Self::from_config(config)
    }

    /// Build the application from an already-loaded configuration
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let cache = Arc::new(WeatherCache::new(
            config.cache.dir.clone(),
            config.cache.ttl(),
        ));
        let client = Arc::new(WeatherClient::new(
            config.provider.client_settings(),
            config.provider.endpoints.clone(),
            cache.clone(),
        )?);

        tracing::info!(
            "Application initialized (cache: {}, ttl: {}s)",
            config.cache.dir.display(),
            config.cache.ttl_secs
        );

        Ok(Self {
            config: Arc::new(config),
            cache,
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<WeatherClient> {
        &self.client
    }

    /// Resolve the configured default location to its best geocoding match.
    pub async fn default_location(&self) -> Result<GeoLocation, AppError> {
        let location = &self.config.location;
        let candidates = self
            .client
            .geocode(&location.city, location.country_code())
            .await?;

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::NotFound(location.city.clone()).into())
    }

    /// Sweep expired cache entries before exit. Returns how many were removed.
    pub fn shutdown(&self) -> usize {
        tracing::info!("Shutting down application");
        let removed = self.cache.sweep_expired();
        if removed > 0 {
            tracing::info!("Removed {} expired cache entries", removed);
        }
        removed
    }
}
