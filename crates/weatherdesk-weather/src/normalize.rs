//! Map provider documents onto flat domain records.
//!
//! Required fields fail fast with [`WeatherError::IncompleteData`] naming the
//! dotted field path (`main.temp`, `weather.0.icon`; series entries are
//! prefixed with their index, `[3].main.temp`). No default is ever
//! substituted for a required field. A present field of the wrong type is a
//! [`WeatherError::Schema`] error.
//!
//! Temperatures are rounded to one decimal, half away from zero:
//!
//! | raw   | rounded |
//! |-------|---------|
//! | 21.05 | 21.1    |
//! | 21.04 | 21.0    |
//! | -3.25 | -3.3    |
//! | 12.34 | 12.3    |
//!
//! Precipitation probability arrives as a 0-1 fraction (absent means 0) and
//! is reported as a 0-100 percentage.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::aqi::{Pollutant, PollutantReading};
use crate::types::{CurrentWeather, DayForecast, HourlyForecast, WeatherError};

/// Round to one decimal place, ties away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let pointer = format!("/{}", path.replace('.', "/"));
    value.pointer(&pointer).filter(|v| !v.is_null())
}

fn field<'a>(value: &'a Value, path: &str) -> Result<&'a Value, WeatherError> {
    lookup(value, path).ok_or_else(|| WeatherError::incomplete(path))
}

fn as_number(value: &Value, path: &str) -> Result<f64, WeatherError> {
    value
        .as_f64()
        .ok_or_else(|| WeatherError::Schema(format!("{} is not a number", path)))
}

fn number(value: &Value, path: &str) -> Result<f64, WeatherError> {
    as_number(field(value, path)?, path)
}

fn optional_number(value: &Value, path: &str) -> Result<Option<f64>, WeatherError> {
    lookup(value, path).map(|v| as_number(v, path)).transpose()
}

fn text(value: &Value, path: &str) -> Result<String, WeatherError> {
    field(value, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| WeatherError::Schema(format!("{} is not a string", path)))
}

fn timestamp(value: &Value, path: &str) -> Result<DateTime<Utc>, WeatherError> {
    let secs = field(value, path)?
        .as_i64()
        .ok_or_else(|| WeatherError::Schema(format!("{} is not a unix timestamp", path)))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| WeatherError::Schema(format!("{} is out of range", path)))
}

fn precipitation_chance(value: &Value) -> Result<f64, WeatherError> {
    let fraction = optional_number(value, "pop")?.unwrap_or(0.0);
    Ok(round1(fraction.clamp(0.0, 1.0) * 100.0))
}

/// Prefix a field error with the series index it came from.
fn at_index(index: usize, error: WeatherError) -> WeatherError {
    match error {
        WeatherError::IncompleteData { field } => {
            WeatherError::incomplete(format!("[{}].{}", index, field))
        }
        WeatherError::Schema(msg) => WeatherError::Schema(format!("[{}].{}", index, msg)),
        other => other,
    }
}

/// Normalize a current-weather document.
pub fn current_weather(data: &Value) -> Result<CurrentWeather, WeatherError> {
    Ok(CurrentWeather {
        temperature: round1(number(data, "main.temp")?),
        feels_like: round1(number(data, "main.feels_like")?),
        humidity: number(data, "main.humidity")?,
        pressure: number(data, "main.pressure")?,
        wind_speed: number(data, "wind.speed")?,
        wind_direction: number(data, "wind.deg")?,
        description: text(data, "weather.0.description")?,
        icon: text(data, "weather.0.icon")?,
        sunrise: timestamp(data, "sys.sunrise")?,
        sunset: timestamp(data, "sys.sunset")?,
    })
}

/// Normalize one entry of the 3-hourly forecast list.
pub fn hourly_point(hour: &Value) -> Result<HourlyForecast, WeatherError> {
    Ok(HourlyForecast {
        time: timestamp(hour, "dt")?,
        temperature: round1(number(hour, "main.temp")?),
        feels_like: round1(number(hour, "main.feels_like")?),
        humidity: number(hour, "main.humidity")?,
        pressure: number(hour, "main.pressure")?,
        wind_speed: number(hour, "wind.speed")?,
        description: text(hour, "weather.0.description")?,
        icon: text(hour, "weather.0.icon")?,
        precipitation_chance: precipitation_chance(hour)?,
    })
}

/// Normalize an hourly series, in chronological order.
pub fn hourly_series(hours: &[Value]) -> Result<Vec<HourlyForecast>, WeatherError> {
    let mut series = hours
        .iter()
        .enumerate()
        .map(|(i, hour)| hourly_point(hour).map_err(|e| at_index(i, e)))
        .collect::<Result<Vec<_>, _>>()?;
    series.sort_by_key(|point| point.time);
    Ok(series)
}

/// Daily temperature as sent by the provider: either one value or a
/// per-period breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DailyTemperature {
    Scalar(f64),
    Breakdown {
        day: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl DailyTemperature {
    fn decode(day: &Value) -> Result<Self, WeatherError> {
        match field(day, "temp")? {
            Value::Number(n) => n
                .as_f64()
                .map(Self::Scalar)
                .ok_or_else(|| WeatherError::Schema("temp is not a number".into())),
            Value::Object(_) => Ok(Self::Breakdown {
                day: number(day, "temp.day")?,
                min: optional_number(day, "temp.min")?,
                max: optional_number(day, "temp.max")?,
            }),
            _ => Err(WeatherError::Schema(
                "temp is neither a number nor an object".into(),
            )),
        }
    }

    fn day(&self) -> f64 {
        match self {
            Self::Scalar(t) => *t,
            Self::Breakdown { day, .. } => *day,
        }
    }

    fn min(&self) -> Option<f64> {
        match self {
            Self::Scalar(_) => None,
            Self::Breakdown { min, .. } => *min,
        }
    }

    fn max(&self) -> Option<f64> {
        match self {
            Self::Scalar(_) => None,
            Self::Breakdown { max, .. } => *max,
        }
    }
}

/// Normalize one entry of the daily forecast list.
///
/// `temp_min`/`temp_max` prefer the top-level fields and fall back to the
/// nested `temp.min`/`temp.max`. Wind speed is read from `speed`, then
/// `wind_speed`.
pub fn daily_point(day: &Value) -> Result<DayForecast, WeatherError> {
    let temp = DailyTemperature::decode(day)?;

    let temp_min = match optional_number(day, "temp_min")? {
        Some(t) => t,
        None => temp.min().ok_or_else(|| WeatherError::incomplete("temp.min"))?,
    };
    let temp_max = match optional_number(day, "temp_max")? {
        Some(t) => t,
        None => temp.max().ok_or_else(|| WeatherError::incomplete("temp.max"))?,
    };
    let wind_speed = match optional_number(day, "speed")? {
        Some(s) => s,
        None => optional_number(day, "wind_speed")?
            .ok_or_else(|| WeatherError::incomplete("speed"))?,
    };

    Ok(DayForecast {
        date: timestamp(day, "dt")?,
        temp_day: round1(temp.day()),
        temp_min: round1(temp_min),
        temp_max: round1(temp_max),
        humidity: number(day, "humidity")?,
        pressure: number(day, "pressure")?,
        wind_speed,
        description: text(day, "weather.0.description")?,
        icon: text(day, "weather.0.icon")?,
        precipitation_chance: precipitation_chance(day)?,
    })
}

/// Normalize a daily series, in chronological order.
pub fn daily_series(days: &[Value]) -> Result<Vec<DayForecast>, WeatherError> {
    let mut series = days
        .iter()
        .enumerate()
        .map(|(i, day)| daily_point(day).map_err(|e| at_index(i, e)))
        .collect::<Result<Vec<_>, _>>()?;
    series.sort_by_key(|point| point.date);
    Ok(series)
}

/// Extract pollutant concentrations from an air-pollution document.
///
/// Components outside the six AQI pollutants are ignored.
pub fn pollutants(data: &Value) -> Result<PollutantReading, WeatherError> {
    let components = field(data, "list.0.components")?
        .as_object()
        .ok_or_else(|| WeatherError::Schema("list.0.components is not an object".into()))?;

    let mut reading = PollutantReading::new();
    for pollutant in Pollutant::ALL {
        let key = pollutant.symbol();
        if let Some(value) = components.get(key).filter(|v| !v.is_null()) {
            let concentration = as_number(value, &format!("list.0.components.{}", key))?;
            reading.insert(pollutant, concentration);
        }
    }
    Ok(reading)
}
