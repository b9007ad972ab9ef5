//! Cache keys for provider requests.

use std::fmt;

use crate::types::Coordinates;

/// Logical data kind of a provider request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    CurrentWeather,
    HourlyForecast,
    DailyForecast,
    ExtendedForecast,
    AirPollution,
    Geocoding,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentWeather => "current_weather",
            Self::HourlyForecast => "hourly_forecast",
            Self::DailyForecast => "daily_forecast",
            Self::ExtendedForecast => "monthly_forecast",
            Self::AirPollution => "air_pollution",
            Self::Geocoding => "geocoding",
        }
    }
}

/// Deterministic identity of a logical request.
///
/// Only the parameters that change the provider's answer take part. The
/// serving tier of an extended forecast is deliberately absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFingerprint {
    kind: RequestKind,
    coordinates: Option<Coordinates>,
    days: Option<u8>,
    query: Option<String>,
}

impl RequestFingerprint {
    pub fn for_location(kind: RequestKind, coordinates: Coordinates) -> Self {
        Self {
            kind,
            coordinates: Some(coordinates),
            days: None,
            query: None,
        }
    }

    pub fn with_days(mut self, days: u8) -> Self {
        self.days = Some(days);
        self
    }

    pub fn for_query(kind: RequestKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            coordinates: None,
            days: None,
            query: Some(query.into()),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

/// Render a coordinate so that 0.0 and -0.0 share a key.
fn coordinate(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(c) = self.coordinates {
            write!(f, "_{}_{}", coordinate(c.latitude), coordinate(c.longitude))?;
        }
        if let Some(days) = self.days {
            write!(f, "_{}d", days)?;
        }
        if let Some(query) = &self.query {
            write!(f, "_q={}", query)?;
        }
        Ok(())
    }
}
