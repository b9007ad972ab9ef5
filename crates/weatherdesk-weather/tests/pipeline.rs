//! End-to-end tests for the acquisition pipeline using wiremock.
//!
//! Each test points a WeatherClient at a mock provider and a temporary
//! cache directory, then runs the raw documents through normalization,
//! AQI, and alert classification.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use weatherdesk_weather::{
    alerts, aqi, normalize, AlertLevel, AqiCategory, ClientSettings, Coordinates, Endpoints,
    ForecastTier, ManualClock, WeatherAlert, WeatherCache, WeatherClient,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TTL: Duration = Duration::from_secs(600);

fn client_for(server: &MockServer, cache: Arc<WeatherCache>) -> WeatherClient {
    WeatherClient::new(
        ClientSettings::new("integration_key").lang("en"),
        Endpoints::with_base(&server.uri()),
        cache,
    )
    .unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 7, 15, 6, 0, 0).unwrap()))
}

fn hot_windy_day() -> serde_json::Value {
    json!({
        "weather": [{"description": "clear sky", "icon": "01d"}],
        "main": {"temp": 38.44, "feels_like": 42.1, "humidity": 40, "pressure": 1005},
        "wind": {"speed": 16.2, "deg": 270},
        "sys": {"sunrise": 1_784_000_000, "sunset": 1_784_048_000}
    })
}

#[tokio::test]
async fn test_current_weather_to_alerts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("appid", "integration_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hot_windy_day()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(WeatherCache::with_clock(dir.path(), TTL, clock()));
    let client = client_for(&server, cache);

    let raw = client.current_weather(Coordinates::new(25.0, 121.5)).await.unwrap();
    let record = normalize::current_weather(&raw).unwrap();
    assert_eq!(record.temperature, 38.4);

    let assessment = alerts::classify(&record);
    assert_eq!(assessment.level, AlertLevel::Danger);
    assert_eq!(
        assessment.alerts,
        vec![WeatherAlert::ExtremeHeat, WeatherAlert::HighWind]
    );
}

#[tokio::test]
async fn test_air_quality_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/air_pollution"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coord": {"lon": 121.5, "lat": 25.0},
            "list": [{
                "main": {"aqi": 2},
                "components": {
                    "co": 270.37, "no": 0.0, "no2": 8.5, "o3": 45.0,
                    "so2": 2.1, "pm2_5": 9.1, "pm10": 15.0, "nh3": 0.6
                },
                "dt": 1_784_000_000
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(WeatherCache::with_clock(dir.path(), TTL, clock()));
    let client = client_for(&server, cache);

    let raw = client.air_pollution(Coordinates::new(25.0, 121.5)).await.unwrap();
    let result = aqi::from_air_pollution(&raw).unwrap();

    assert_eq!(result.aqi, 51);
    assert_eq!(result.category, AqiCategory::Moderate);
    assert_eq!(result.sub_indices.len(), 6);
}

#[tokio::test]
async fn test_cache_shared_across_clients_and_swept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast/daily"))
        .and(query_param("cnt", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{
                "dt": 1_784_000_000,
                "temp": {"day": 30.05, "min": 26.0, "max": 33.2},
                "humidity": 70, "pressure": 1009, "speed": 4.0,
                "weather": [{"description": "light rain", "icon": "10d"}],
                "pop": 0.6
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let coords = Coordinates::new(25.0, 121.5);

    let first = client_for(
        &server,
        Arc::new(WeatherCache::with_clock(dir.path(), TTL, clock.clone())),
    );
    let days = first.daily_forecast(coords, 7).await.unwrap();

    // A second client over the same directory sees the entry.
    let second_cache = Arc::new(WeatherCache::with_clock(dir.path(), TTL, clock.clone()));
    let second = client_for(&server, second_cache.clone());
    assert_eq!(second.daily_forecast(coords, 7).await.unwrap(), days);

    let series = normalize::daily_series(&days).unwrap();
    assert_eq!(series[0].temp_day, 30.1);
    assert_eq!(series[0].precipitation_chance, 60.0);

    clock.advance(TTL);
    assert_eq!(second_cache.sweep_expired(), 1);
}

#[tokio::test]
async fn test_extended_forecast_fallback_normalizes_free_tier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast/climate"))
        .respond_with(ResponseTemplate::new(403).set_body_string("subscription required"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast/daily"))
        .and(query_param("cnt", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "dt": 1_784_000_000,
            "temp": 29.0,
            "temp_min": 25.0,
            "temp_max": 31.0,
            "humidity": 75, "pressure": 1008, "wind_speed": 3.0,
            "weather": [{"description": "overcast clouds", "icon": "04d"}]
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(WeatherCache::with_clock(dir.path(), TTL, clock()));
    let client = client_for(&server, cache);

    let forecast = client
        .extended_forecast(Coordinates::new(25.0, 121.5))
        .await
        .unwrap();
    assert_eq!(forecast.tier, ForecastTier::Free);

    let series = normalize::daily_series(&forecast.days).unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].temp_max, 31.0);
}
