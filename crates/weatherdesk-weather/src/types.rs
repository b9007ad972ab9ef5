use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic coordinates of a request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Candidate location returned by a geocoding lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeoLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Display name such as "Taipei, TW"
    pub fn display_name(&self) -> String {
        match self.country.as_deref() {
            Some(country) if !country.is_empty() => format!("{}, {}", self.name, country),
            _ => self.name.clone(),
        }
    }
}

/// Current weather conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// °C, 1 decimal
    pub temperature: f64,
    /// °C, 1 decimal
    pub feels_like: f64,
    /// %
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
    /// degrees
    pub wind_direction: f64,
    pub description: String,
    pub icon: String,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    /// 0-100
    pub precipitation_chance: f64,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: DateTime<Utc>,
    pub temp_day: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    /// 0-100
    pub precipitation_chance: f64,
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Protocol(String),
    #[error("Unexpected response shape: {0}")]
    Schema(String),
    #[error("Missing required field: {field}")]
    IncompleteData { field: String },
    #[error("No usable pollutant data")]
    NoPollutantData,
    #[error("Not found: {0}")]
    NotFound(String),
}

impl WeatherError {
    pub(crate) fn incomplete(field: impl Into<String>) -> Self {
        Self::IncompleteData {
            field: field.into(),
        }
    }

    /// Classify a transport failure from reqwest
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error)
        }
    }

    /// Whether a premium-tier failure of this kind may be recovered by the
    /// free-tier attempt. Every remote failure qualifies; normalization and
    /// AQI errors never come out of a remote attempt.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout
                | Self::Http { .. }
                | Self::Protocol(_)
                | Self::Schema(_)
        )
    }

    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Unable to reach the weather service. Check your connection.",
            Self::Timeout => "The weather service took too long to respond. Please try again.",
            Self::Http { status, .. } if *status == 401 => {
                "Weather API key is invalid. Check settings."
            }
            Self::Http { status, .. } if *status == 429 => {
                "Too many weather requests. Please wait and try again."
            }
            Self::Http { status, .. } if *status >= 500 => {
                "Weather service unavailable. Please try again later."
            }
            Self::Http { .. } => "Weather request failed. Please try again.",
            Self::Protocol(_) | Self::Schema(_) => {
                "Received an unexpected response from the weather service."
            }
            Self::IncompleteData { .. } => "Weather data is incomplete.",
            Self::NoPollutantData => "Air quality data is unavailable for this location.",
            Self::NotFound(_) => "Location not found. Check and try again.",
        }
    }
}
