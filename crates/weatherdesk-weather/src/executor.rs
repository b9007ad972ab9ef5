//! Request executor: parameter merging, transport, and response validation.
//!
//! The executor performs exactly one HTTP attempt per call. Retry and
//! fallback decisions belong to [`crate::client::WeatherClient`].

use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::types::WeatherError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Fixed parameters sent with every provider request
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub units: String,
    pub lang: String,
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            units: "metric".to_string(),
            lang: "zh_tw".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Document shape a caller expects from an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Object,
    List,
}

/// Decoded provider document
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Object(Map<String, Value>),
    List(Vec<Value>),
    Scalar(Value),
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::List(items),
            other => Self::Scalar(other),
        }
    }
}

impl Document {
    fn describe(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Scalar(Value::Null) => "null",
            Self::Scalar(Value::Bool(_)) => "boolean",
            Self::Scalar(Value::Number(_)) => "number",
            Self::Scalar(_) => "string",
        }
    }
}

/// Reconcile a decoded document with the shape the caller expects.
///
/// | expected | received | outcome                   |
/// |----------|----------|---------------------------|
/// | list     | list     | returned as-is            |
/// | list     | other    | `Schema` error            |
/// | object   | object   | returned as-is            |
/// | object   | list     | wrapped as `{"list": ..}` |
/// | object   | scalar   | `Schema` error            |
///
/// The list-to-object wrap accommodates endpoints that answer a keyed
/// document with a bare array.
pub fn coerce_shape(value: Value, expected: ResponseShape) -> Result<Value, WeatherError> {
    match (expected, Document::from(value)) {
        (ResponseShape::List, Document::List(items)) => Ok(Value::Array(items)),
        (ResponseShape::Object, Document::Object(map)) => Ok(Value::Object(map)),
        (ResponseShape::Object, Document::List(items)) => {
            let mut map = Map::new();
            map.insert("list".to_string(), Value::Array(items));
            Ok(Value::Object(map))
        }
        (ResponseShape::List, other) => Err(WeatherError::Schema(format!(
            "expected a list, got {}",
            other.describe()
        ))),
        (ResponseShape::Object, other) => Err(WeatherError::Schema(format!(
            "expected an object, got {}",
            other.describe()
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Arc<Client>,
    settings: ClientSettings,
}

impl RequestExecutor {
    pub fn new(settings: ClientSettings) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(WeatherError::Network)?;

        Ok(Self {
            client: Arc::new(client),
            settings,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Fixed parameters overlaid with the per-call ones; on a key collision
    /// the per-call value wins.
    pub fn merge_params(&self, params: &[(&str, String)]) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        merged.insert("appid".to_string(), self.settings.api_key.clone());
        merged.insert("units".to_string(), self.settings.units.clone());
        merged.insert("lang".to_string(), self.settings.lang.clone());
        for (key, value) in params {
            merged.insert((*key).to_string(), value.clone());
        }
        merged
    }

    /// Issue one GET and validate the response.
    pub async fn execute(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        expected: ResponseShape,
    ) -> Result<Value, WeatherError> {
        let merged = self.merge_params(params);

        let masked: BTreeMap<&str, &str> = merged
            .iter()
            .map(|(k, v)| {
                let v = if k == "appid" { "***" } else { v.as_str() };
                (k.as_str(), v)
            })
            .collect();
        tracing::debug!("GET {} params={:?}", endpoint, masked);

        let response = self
            .client
            .get(endpoint)
            .query(&merged)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Request to {} failed: {}", endpoint, e);
                WeatherError::from_transport(e)
            })?;

        let status = response.status();
        tracing::debug!("{} responded {}", endpoint, status);

        let body = response.text().await.map_err(WeatherError::from_transport)?;

        if !status.is_success() {
            tracing::error!("HTTP {} from {}: {}", status, endpoint, body);
            return Err(WeatherError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Unparseable response from {}: {}", endpoint, e);
            WeatherError::Protocol(e.to_string())
        })?;

        coerce_shape(value, expected)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor() -> RequestExecutor {
        RequestExecutor::new(ClientSettings::new("test_key")).unwrap()
    }

    #[test]
    fn test_coerce_object_passthrough() {
        let value = json!({"main": {"temp": 1.0}});
        assert_eq!(coerce_shape(value.clone(), ResponseShape::Object).unwrap(), value);
    }

    #[test]
    fn test_coerce_list_passthrough() {
        let value = json!([{"name": "Taipei"}]);
        assert_eq!(coerce_shape(value.clone(), ResponseShape::List).unwrap(), value);
    }

    #[test]
    fn test_coerce_wraps_list_when_object_expected() {
        let value = json!([{"dt": 1}, {"dt": 2}]);
        assert_eq!(
            coerce_shape(value, ResponseShape::Object).unwrap(),
            json!({"list": [{"dt": 1}, {"dt": 2}]})
        );
    }

    #[test]
    fn test_coerce_rejects_object_when_list_expected() {
        let err = coerce_shape(json!({"cod": "404"}), ResponseShape::List).unwrap_err();
        assert!(matches!(err, WeatherError::Schema(msg) if msg.contains("object")));
    }

    #[test]
    fn test_coerce_rejects_scalars() {
        assert!(matches!(
            coerce_shape(json!("hello"), ResponseShape::Object),
            Err(WeatherError::Schema(_))
        ));
        assert!(matches!(
            coerce_shape(json!(null), ResponseShape::List),
            Err(WeatherError::Schema(_))
        ));
    }

    #[test]
    fn test_merge_params_last_write_wins() {
        let merged = executor().merge_params(&[
            ("lat", "25.03".to_string()),
            ("lang", "en".to_string()),
        ]);
        assert_eq!(merged["appid"], "test_key");
        assert_eq!(merged["units"], "metric");
        assert_eq!(merged["lang"], "en");
        assert_eq!(merged["lat"], "25.03");
    }

    #[tokio::test]
    async fn test_execute_sends_merged_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("appid", "test_key"))
            .and(query_param("units", "metric"))
            .and(query_param("lang", "zh_tw"))
            .and(query_param("lat", "1.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let value = executor()
            .execute(
                &format!("{}/weather", mock_server.uri()),
                &[("lat", "1.5".to_string())],
                ResponseShape::Object,
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_execute_http_error_carries_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"cod":401,"message":"Invalid API key"}"#),
            )
            .mount(&mock_server)
            .await;

        let err = executor()
            .execute(
                &format!("{}/weather", mock_server.uri()),
                &[],
                ResponseShape::Object,
            )
            .await
            .unwrap_err();

        match err {
            WeatherError::Http { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_error_status_with_html_body_is_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(502).set_body_string("<html><body>Bad Gateway</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let err = executor()
            .execute(
                &format!("{}/weather", mock_server.uri()),
                &[],
                ResponseShape::Object,
            )
            .await
            .unwrap_err();

        match err {
            WeatherError::Http { status, body } => {
                assert_eq!(status, 502);
                assert!(body.starts_with("<html>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_unparseable_body_is_protocol_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let err = executor()
            .execute(
                &format!("{}/weather", mock_server.uri()),
                &[],
                ResponseShape::Object,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_execute_wraps_list_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast/daily"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"dt": 1}])))
            .mount(&mock_server)
            .await;

        let value = executor()
            .execute(
                &format!("{}/forecast/daily", mock_server.uri()),
                &[],
                ResponseShape::Object,
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"list": [{"dt": 1}]}));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let executor = RequestExecutor::new(
            ClientSettings::new("k").timeout(Duration::from_millis(50)),
        )
        .unwrap();
        let err = executor
            .execute(&format!("{}/slow", mock_server.uri()), &[], ResponseShape::Object)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Timeout));
    }

    #[tokio::test]
    async fn test_execute_unreachable_is_network_error() {
        // Nothing listens on the discard port.
        let err = executor()
            .execute("http://127.0.0.1:9/weather", &[], ResponseShape::Object)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Network(_)));
    }
}
