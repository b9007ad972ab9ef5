use anyhow::Result;
use weatherdesk_core::App;
use weatherdesk_weather::{alerts, aqi, normalize, Coordinates, WeatherClient, WeatherError};

const DAILY_DAYS: u8 = 7;

#[tokio::main]
async fn main() -> Result<()> {
    weatherdesk_core::init()?;

    let app = App::new()?;
    tracing::info!("WeatherDesk started");

    let location = match app.default_location().await {
        Ok(location) => location,
        Err(e) => {
            tracing::error!("Could not resolve default location: {}", e);
            println!("{}", e.user_message());
            app.shutdown();
            return Ok(());
        }
    };

    println!("WeatherDesk - {}", location.display_name());
    println!();

    let client = app.client();
    let coordinates = location.coordinates();

    report_section("Current conditions", current(client, coordinates).await);
    report_section("Next hours", hourly(client, coordinates).await);
    report_section("Daily forecast", daily(client, coordinates).await);
    report_section("Extended forecast", extended(client, coordinates).await);
    report_section("Air quality", air_quality(client, coordinates).await);

    app.shutdown();
    Ok(())
}

fn report_section(title: &str, lines: Result<Vec<String>, WeatherError>) {
    println!("== {} ==", title);
    match lines {
        Ok(lines) => lines.iter().for_each(|line| println!("  {}", line)),
        Err(e) => {
            tracing::warn!("{} unavailable: {}", title, e);
            println!("  {}", e.user_message());
        }
    }
    println!();
}

async fn current(client: &WeatherClient, at: Coordinates) -> Result<Vec<String>, WeatherError> {
    let weather = normalize::current_weather(&client.current_weather(at).await?)?;
    let assessment = alerts::classify(&weather);

    let mut lines = vec![
        format!(
            "{:.1}° (feels like {:.1}°), {}",
            weather.temperature, weather.feels_like, weather.description
        ),
        format!(
            "Humidity {}%  Pressure {} hPa  Wind {} m/s @ {}°",
            weather.humidity, weather.pressure, weather.wind_speed, weather.wind_direction
        ),
        format!(
            "Sunrise {}  Sunset {}",
            weather.sunrise.format("%H:%M UTC"),
            weather.sunset.format("%H:%M UTC")
        ),
        format!("Alert level: {}", assessment.level.label()),
    ];
    lines.extend(
        assessment
            .alerts
            .iter()
            .map(|alert| format!("  ! {}", alert.description())),
    );
    Ok(lines)
}

async fn hourly(client: &WeatherClient, at: Coordinates) -> Result<Vec<String>, WeatherError> {
    let series = normalize::hourly_series(&client.hourly_forecast(at).await?)?;
    Ok(series
        .iter()
        .take(8)
        .map(|hour| {
            format!(
                "{}  {:>5.1}°  {:>3.0}% rain  {}",
                hour.time.format("%m-%d %H:%M"),
                hour.temperature,
                hour.precipitation_chance,
                hour.description
            )
        })
        .collect())
}

async fn daily(client: &WeatherClient, at: Coordinates) -> Result<Vec<String>, WeatherError> {
    let series = normalize::daily_series(&client.daily_forecast(at, DAILY_DAYS).await?)?;
    Ok(series
        .iter()
        .map(|day| {
            format!(
                "{}  {:>5.1}° / {:>5.1}°  {:>3.0}% rain  {}",
                day.date.format("%a %m-%d"),
                day.temp_max,
                day.temp_min,
                day.precipitation_chance,
                day.description
            )
        })
        .collect())
}

async fn extended(client: &WeatherClient, at: Coordinates) -> Result<Vec<String>, WeatherError> {
    let forecast = client.extended_forecast(at).await?;
    let series = normalize::daily_series(&forecast.days)?;

    let mut lines = vec![format!("{} days ({:?} tier)", series.len(), forecast.tier)];
    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        lines.push(format!(
            "{} to {}",
            first.date.format("%m-%d"),
            last.date.format("%m-%d")
        ));
    }
    if let Some(hottest) = series.iter().max_by(|a, b| a.temp_max.total_cmp(&b.temp_max)) {
        lines.push(format!(
            "Warmest: {} at {:.1}°",
            hottest.date.format("%m-%d"),
            hottest.temp_max
        ));
    }
    Ok(lines)
}

async fn air_quality(client: &WeatherClient, at: Coordinates) -> Result<Vec<String>, WeatherError> {
    let result = aqi::from_air_pollution(&client.air_pollution(at).await?)?;

    let mut lines = vec![format!(
        "AQI {} ({}, {})",
        result.aqi,
        result.label(),
        result.color()
    )];
    if let Some(dominant) = result.dominant() {
        lines.push(format!("Dominant pollutant: {}", dominant.display_name()));
    }
    lines.extend(result.sub_indices.iter().map(|(pollutant, index)| {
        format!(
            "{:<6} {:>4}  ({:.1} μg/m³)",
            pollutant.symbol(),
            index,
            result.concentrations.get(*pollutant).unwrap_or_default()
        )
    }));
    Ok(lines)
}
