use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use weatherdesk_weather::executor::DEFAULT_TIMEOUT_SECS;
use weatherdesk_weather::{ClientSettings, Endpoints};

use crate::{AppError, ConfigError};

const APP_DIR: &str = "weatherdesk";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather provider credentials and request defaults
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Default location shown at startup
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenWeatherMap API key (usually supplied via OPENWEATHER_API_KEY)
    pub api_key: String,

    /// Unit system passed to the provider (`metric`, `imperial`, `standard`)
    pub units: String,

    /// Language for descriptions
    pub lang: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    pub endpoints: Endpoints,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            units: "metric".to_string(),
            lang: "zh_tw".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            endpoints: Endpoints::default(),
        }
    }
}

impl ProviderConfig {
    /// Request settings for the weather client.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings::new(self.api_key.clone())
            .units(self.units.clone())
            .lang(self.lang.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one JSON file per cached request
    pub dir: PathBuf,

    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_config_dir().join("cache"),
            ttl_secs: 1800,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub city: String,
    /// ISO 3166 country code; empty means "any country"
    pub country: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            city: "Taipei".to_string(),
            country: "TW".to_string(),
        }
    }
}

impl LocationConfig {
    pub fn country_code(&self) -> Option<&str> {
        Some(self.country.trim()).filter(|c| !c.is_empty())
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Load configuration from the user config directory, creating a
    /// default file if it doesn't exist, then apply environment overrides.
    pub fn load() -> Result<Self, AppError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults there if absent.
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), AppError> {
        Self::load()?.into_validated()
    }

    /// Validate, logging warnings and rejecting the config on any error.
    pub fn into_validated(self) -> Result<(Self, ValidationResult), AppError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Overlay values from the environment.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(city) = lookup("DEFAULT_CITY") {
            self.location.city = city;
        }
        if let Some(country) = lookup("DEFAULT_COUNTRY") {
            self.location.country = country;
        }
        if let Some(units) = lookup("DEFAULT_UNITS") {
            self.provider.units = units;
        }
        if let Some(lang) = lookup("DEFAULT_LANG") {
            self.provider.lang = lang;
        }
        if let Some(raw) = lookup("CACHE_DURATION") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => tracing::warn!("Ignoring CACHE_DURATION={:?}: not a whole number of seconds", raw),
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.provider.api_key.trim().is_empty() {
            result.add_error(
                "provider.api_key",
                "API key is required (set OPENWEATHER_API_KEY)",
            );
        }

        if self.provider.timeout_secs == 0 {
            result.add_error("provider.timeout_secs", "Timeout must be greater than 0");
        }

        let endpoints = &self.provider.endpoints;
        for (field, url) in [
            ("provider.endpoints.current_weather", &endpoints.current_weather),
            ("provider.endpoints.forecast", &endpoints.forecast),
            ("provider.endpoints.forecast_daily", &endpoints.forecast_daily),
            ("provider.endpoints.forecast_climate", &endpoints.forecast_climate),
            ("provider.endpoints.air_pollution", &endpoints.air_pollution),
            ("provider.endpoints.geocoding", &endpoints.geocoding),
        ] {
            Self::validate_url(url, field, &mut result);
        }

        if self.cache.ttl_secs == 0 {
            result.add_warning("cache.ttl_secs", "Caching disabled (0 seconds)");
        }

        if self.location.city.trim().is_empty() {
            result.add_warning("location.city", "No default city configured");
        }

        result
    }

    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("cannot serialize config: {}", e)))?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(APP_DIR);

        Ok(config_dir.join("config.toml"))
    }
}
