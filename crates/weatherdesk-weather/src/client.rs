//! Cache-first weather client with tiered extended-forecast fallback.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::cache::WeatherCache;
use crate::executor::{ClientSettings, RequestExecutor, ResponseShape};
use crate::fingerprint::{RequestFingerprint, RequestKind};
use crate::types::{Coordinates, GeoLocation, WeatherError};

const DATA_API_BASE: &str = "https://api.openweathermap.org/data/2.5";
const GEOCODING_API: &str = "https://api.openweathermap.org/geo/1.0/direct";

/// Maximum day count the free daily endpoint serves
pub const MAX_DAILY_DAYS: u8 = 16;
/// Number of candidates requested from geocoding
pub const GEOCODING_LIMIT: usize = 5;

/// Provider URL per endpoint kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub current_weather: String,
    pub forecast: String,
    pub forecast_daily: String,
    pub forecast_climate: String,
    pub air_pollution: String,
    pub geocoding: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        let mut endpoints = Self::with_base(DATA_API_BASE);
        endpoints.geocoding = GEOCODING_API.to_string();
        endpoints
    }
}

impl Endpoints {
    /// All endpoints under one base URL, using the provider's path layout.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            current_weather: format!("{}/weather", base),
            forecast: format!("{}/forecast", base),
            forecast_daily: format!("{}/forecast/daily", base),
            forecast_climate: format!("{}/forecast/climate", base),
            air_pollution: format!("{}/air_pollution", base),
            geocoding: format!("{}/geo/1.0/direct", base),
        }
    }
}

/// Service level that answered an extended forecast request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastTier {
    /// 30-day climate forecast
    Premium,
    /// 16-day daily forecast
    Free,
}

impl ForecastTier {
    pub fn day_count(&self) -> u8 {
        match self {
            Self::Premium => 30,
            Self::Free => MAX_DAILY_DAYS,
        }
    }
}

/// Outcome of a single tier attempt
#[derive(Debug)]
pub enum TierAttempt {
    Success { tier: ForecastTier, days: Vec<Value> },
    Failure { tier: ForecastTier, error: WeatherError },
}

impl TierAttempt {
    /// Tier to try next, if any.
    ///
    /// Only a premium failure with a fallback-eligible error moves on to
    /// the free tier; the free tier is the last one.
    pub fn fallback_tier(&self) -> Option<ForecastTier> {
        match self {
            Self::Failure {
                tier: ForecastTier::Premium,
                error,
            } if error.is_fallback_eligible() => Some(ForecastTier::Free),
            _ => None,
        }
    }
}

/// Extended forecast tagged with the tier that served it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedForecast {
    pub tier: ForecastTier,
    pub days: Vec<Value>,
}

/// Pull the provider's `list` array out of a keyed document.
fn take_list(payload: Value, what: &str) -> Result<Vec<Value>, WeatherError> {
    match payload {
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(WeatherError::Schema(format!("{}: `list` is not an array", what))),
            None => Err(WeatherError::Schema(format!("{}: missing `list`", what))),
        },
        _ => Err(WeatherError::Schema(format!("{}: expected an object", what))),
    }
}

fn location_params(coordinates: Coordinates) -> Vec<(&'static str, String)> {
    vec![
        ("lat", coordinates.latitude.to_string()),
        ("lon", coordinates.longitude.to_string()),
    ]
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    executor: RequestExecutor,
    endpoints: Endpoints,
    cache: Arc<WeatherCache>,
}

impl WeatherClient {
    pub fn new(
        settings: ClientSettings,
        endpoints: Endpoints,
        cache: Arc<WeatherCache>,
    ) -> Result<Self, WeatherError> {
        Ok(Self {
            executor: RequestExecutor::new(settings)?,
            endpoints,
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn cached<T: DeserializeOwned>(&self, fingerprint: &str) -> Option<T> {
        let value = self.cache.get(fingerprint)?;
        match serde_json::from_value(value) {
            Ok(hit) => Some(hit),
            Err(e) => {
                tracing::warn!("Ignoring cached {} with unexpected shape: {}", fingerprint, e);
                None
            }
        }
    }

    fn store<T: Serialize>(&self, fingerprint: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.cache.set(fingerprint, &value),
            Err(e) => tracing::warn!("Failed to serialize {} for caching: {}", fingerprint, e),
        }
    }

    /// Current conditions as the provider's raw document.
    #[instrument(skip(self), level = "info")]
    pub async fn current_weather(&self, coordinates: Coordinates) -> Result<Value, WeatherError> {
        let fingerprint =
            RequestFingerprint::for_location(RequestKind::CurrentWeather, coordinates).to_string();
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let data = self
            .executor
            .execute(
                &self.endpoints.current_weather,
                &location_params(coordinates),
                ResponseShape::Object,
            )
            .await?;
        self.cache.set(&fingerprint, &data);
        Ok(data)
    }

    /// 5-day forecast in 3-hour steps.
    #[instrument(skip(self), level = "info")]
    pub async fn hourly_forecast(
        &self,
        coordinates: Coordinates,
    ) -> Result<Vec<Value>, WeatherError> {
        let fingerprint =
            RequestFingerprint::for_location(RequestKind::HourlyForecast, coordinates).to_string();
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let mut params = location_params(coordinates);
        // Place names in this feed are wanted in English regardless of the UI language.
        params.push(("lang", "en".to_string()));

        let payload = self
            .executor
            .execute(&self.endpoints.forecast, &params, ResponseShape::Object)
            .await?;
        let hours = take_list(payload, "hourly forecast")?;
        self.store(&fingerprint, &hours);
        Ok(hours)
    }

    /// Daily forecast for `days` days, clamped to 1..=16.
    #[instrument(skip(self), level = "info")]
    pub async fn daily_forecast(
        &self,
        coordinates: Coordinates,
        days: u8,
    ) -> Result<Vec<Value>, WeatherError> {
        let days = days.clamp(1, MAX_DAILY_DAYS);
        let fingerprint = RequestFingerprint::for_location(RequestKind::DailyForecast, coordinates)
            .with_days(days)
            .to_string();
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let mut params = location_params(coordinates);
        params.push(("cnt", days.to_string()));

        let payload = self
            .executor
            .execute(&self.endpoints.forecast_daily, &params, ResponseShape::Object)
            .await?;
        let daily = take_list(payload, "daily forecast")?;
        self.store(&fingerprint, &daily);
        Ok(daily)
    }

    /// One attempt against a single tier; never falls through to another.
    pub async fn attempt_tier(&self, coordinates: Coordinates, tier: ForecastTier) -> TierAttempt {
        let endpoint = match tier {
            ForecastTier::Premium => &self.endpoints.forecast_climate,
            ForecastTier::Free => &self.endpoints.forecast_daily,
        };
        let mut params = location_params(coordinates);
        params.push(("cnt", tier.day_count().to_string()));

        let result = self
            .executor
            .execute(endpoint, &params, ResponseShape::Object)
            .await
            .and_then(|payload| take_list(payload, "extended forecast"));

        match result {
            Ok(days) => TierAttempt::Success { tier, days },
            Err(error) => TierAttempt::Failure { tier, error },
        }
    }

    /// 30-day forecast, falling back once to the free 16-day forecast.
    ///
    /// The cache key does not depend on the serving tier, so a cached free
    /// tier answer is returned until it expires; the result's `tier` says
    /// which one it is.
    #[instrument(skip(self), level = "info")]
    pub async fn extended_forecast(
        &self,
        coordinates: Coordinates,
    ) -> Result<ExtendedForecast, WeatherError> {
        let fingerprint =
            RequestFingerprint::for_location(RequestKind::ExtendedForecast, coordinates)
                .to_string();
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let mut attempt = self.attempt_tier(coordinates, ForecastTier::Premium).await;
        if let Some(next) = attempt.fallback_tier() {
            if let TierAttempt::Failure { tier, error } = &attempt {
                tracing::warn!(
                    "{:?} extended forecast failed: {}; falling back to the {:?} {}-day forecast",
                    tier,
                    error,
                    next,
                    next.day_count()
                );
            }
            attempt = self.attempt_tier(coordinates, next).await;
        }

        let forecast = match attempt {
            TierAttempt::Success { tier, days } => ExtendedForecast { tier, days },
            TierAttempt::Failure { error, .. } => return Err(error),
        };

        self.store(&fingerprint, &forecast);
        Ok(forecast)
    }

    /// Air pollution document for a location.
    #[instrument(skip(self), level = "info")]
    pub async fn air_pollution(&self, coordinates: Coordinates) -> Result<Value, WeatherError> {
        let fingerprint =
            RequestFingerprint::for_location(RequestKind::AirPollution, coordinates).to_string();
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let data = self
            .executor
            .execute(
                &self.endpoints.air_pollution,
                &location_params(coordinates),
                ResponseShape::Object,
            )
            .await?;
        self.cache.set(&fingerprint, &data);
        Ok(data)
    }

    /// Resolve a place name to up to five provider-ranked candidates.
    ///
    /// The first candidate is the best match. An empty answer is `NotFound`
    /// and is not cached.
    #[instrument(skip(self), level = "info")]
    pub async fn geocode(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<Vec<GeoLocation>, WeatherError> {
        let query = match country.filter(|c| !c.is_empty()) {
            Some(country) => format!("{},{}", city, country),
            None => city.to_string(),
        };
        let fingerprint = RequestFingerprint::for_query(RequestKind::Geocoding, &query).to_string();
        if let Some(hit) = self.cached::<Vec<GeoLocation>>(&fingerprint) {
            if !hit.is_empty() {
                return Ok(hit);
            }
        }

        let params = [
            ("q", query.clone()),
            ("limit", GEOCODING_LIMIT.to_string()),
        ];
        let payload = self
            .executor
            .execute(&self.endpoints.geocoding, &params, ResponseShape::List)
            .await?;

        let mut candidates: Vec<GeoLocation> = serde_json::from_value(payload)
            .map_err(|e| WeatherError::Schema(format!("geocoding candidate: {}", e)))?;
        candidates.truncate(GEOCODING_LIMIT);

        if candidates.is_empty() {
            return Err(WeatherError::NotFound(query));
        }

        tracing::info!("Geocoded {} to {}", query, candidates[0].display_name());
        self.store(&fingerprint, &candidates);
        Ok(candidates)
    }
}
