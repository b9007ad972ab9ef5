//! Weather acquisition and normalization for WeatherDesk
//!
//! Fetches current conditions, forecasts, and air quality from
//! OpenWeatherMap through a persistent TTL cache, then turns the raw
//! documents into uniform records, an EPA-style AQI, and threshold alerts.

pub mod types;
pub mod cache;
pub mod fingerprint;
pub mod executor;
pub mod client;
pub mod normalize;
pub mod aqi;
pub mod alerts;

pub use types::*;
pub use cache::{Clock, ManualClock, SystemClock, WeatherCache};
pub use client::{Endpoints, ExtendedForecast, ForecastTier, TierAttempt, WeatherClient};
pub use executor::{ClientSettings, RequestExecutor, ResponseShape};
pub use fingerprint::{RequestFingerprint, RequestKind};
pub use aqi::{AqiCategory, AqiResult, Pollutant, PollutantReading};
pub use alerts::{AlertAssessment, AlertLevel, WeatherAlert};
