//! Threshold alerts over current conditions.

use serde::{Deserialize, Serialize};

use crate::types::CurrentWeather;

pub const EXTREME_HEAT_C: f64 = 38.0;
pub const HEAT_C: f64 = 35.0;
pub const COLD_C: f64 = 0.0;
pub const HIGH_HUMIDITY_PCT: f64 = 85.0;
pub const STRONG_WIND_MS: f64 = 20.0;
pub const HIGH_WIND_MS: f64 = 15.0;

/// Overall severity; ordered so that `max` escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Danger => "Danger",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Normal => "green",
            Self::Warning => "orange",
            Self::Danger => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherAlert {
    ExtremeHeat,
    Heat,
    Cold,
    HighHumidity,
    StrongWind,
    HighWind,
}

impl WeatherAlert {
    /// Severity this alert contributes on its own
    pub fn level(&self) -> AlertLevel {
        match self {
            Self::ExtremeHeat | Self::StrongWind => AlertLevel::Danger,
            Self::Heat | Self::Cold | Self::HighHumidity | Self::HighWind => AlertLevel::Warning,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExtremeHeat => "Extreme heat",
            Self::Heat => "High temperature",
            Self::Cold => "Low temperature",
            Self::HighHumidity => "High humidity",
            Self::StrongWind => "Strong wind",
            Self::HighWind => "High wind",
        }
    }
}

/// Classifier output: highest severity plus every triggered alert, in rule order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlertAssessment {
    pub level: AlertLevel,
    pub alerts: Vec<WeatherAlert>,
}

impl AlertAssessment {
    fn raise(&mut self, alert: WeatherAlert) {
        self.level = self.level.max(alert.level());
        self.alerts.push(alert);
    }

    pub fn is_normal(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Evaluate temperature, humidity, and wind rules, in that order.
pub fn classify(weather: &CurrentWeather) -> AlertAssessment {
    let mut assessment = AlertAssessment::default();

    let t = weather.temperature;
    if t >= EXTREME_HEAT_C {
        assessment.raise(WeatherAlert::ExtremeHeat);
    } else if t >= HEAT_C {
        assessment.raise(WeatherAlert::Heat);
    } else if t <= COLD_C {
        assessment.raise(WeatherAlert::Cold);
    }

    if weather.humidity >= HIGH_HUMIDITY_PCT {
        assessment.raise(WeatherAlert::HighHumidity);
    }

    let wind = weather.wind_speed;
    if wind >= STRONG_WIND_MS {
        assessment.raise(WeatherAlert::StrongWind);
    } else if wind >= HIGH_WIND_MS {
        assessment.raise(WeatherAlert::HighWind);
    }

    assessment
}
