use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::fmt;

use crate::{
    WeatherRecord,
    config::DEFAULT_API_BASE_URL,
    error::FetchError,
    provider::kelvin_to_fahrenheit,
};

use super::WeatherProvider;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

#[derive(Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl fmt::Debug for OpenWeatherProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherProvider")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn fetch_current(&self, city: &str) -> Result<WeatherRecord, FetchError> {
        let url = format!("{}{CURRENT_WEATHER_PATH}", self.base_url);

        // No `units` parameter: the provider answers in Kelvin.
        let res = self
            .http
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|source| FetchError::Request { city: city.to_string(), source })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| FetchError::Request { city: city.to_string(), source })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                city: city.to_string(),
                status,
                body: truncate_body(&body),
            });
        }

        let timestamp = Utc::now();

        let raw = RawValue::from_string(body)
            .map_err(|source| FetchError::Parse { city: city.to_string(), source })?;
        let parsed: OwCurrentResponse = serde_json::from_str(raw.get())
            .map_err(|source| FetchError::Parse { city: city.to_string(), source })?;

        let condition = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| FetchError::MissingField {
                city: city.to_string(),
                field: "weather[0].description",
            })?;

        Ok(WeatherRecord {
            city: city.to_string(),
            temperature_f: kelvin_to_fahrenheit(parsed.main.temp),
            humidity: parsed.main.humidity,
            condition,
            timestamp,
            raw,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError> {
        let trimmed = city.trim();
        if trimmed.is_empty() {
            return Err(FetchError::EmptyCity { city: city.to_string() });
        }
        let city = trimmed;

        tracing::debug!(%city, "requesting current weather");
        self.fetch_current(city).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn london_payload() -> serde_json::Value {
        json!({
            "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
            "main": {"temp": 285.5, "feels_like": 284.9, "humidity": 81},
            "name": "London",
            "dt": 1760779800
        })
    }

    #[tokio::test]
    async fn fetch_normalizes_current_weather() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        let started = Utc::now();
        let record = provider.fetch("London").await.expect("fetch should succeed");

        assert_eq!(record.city, "London");
        assert!((record.temperature_f - kelvin_to_fahrenheit(285.5)).abs() < 1e-9);
        assert_eq!(record.humidity, 81);
        assert_eq!(record.condition, "light rain");
        assert!(record.timestamp >= started);
        let raw: serde_json::Value = serde_json::from_str(record.raw.get()).unwrap();
        assert_eq!(raw, london_payload());
    }

    #[tokio::test]
    async fn raw_keeps_provider_number_formatting() {
        let body = r#"{"weather":[{"description":"rain"}],"main":{"temp":285.50,"humidity":81},"dt":1.0e2,"id":123456789012345678901234}"#;
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        let record = provider.fetch("London").await.unwrap();

        assert_eq!(record.raw.get(), body);
        assert!((record.temperature_f - kelvin_to_fahrenheit(285.5)).abs() < 1e-9);
        assert_eq!(record.condition, "rain");
    }

    #[tokio::test]
    async fn keeps_configured_city_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        let record = provider.fetch("london,uk").await.unwrap();
        assert_eq!(record.city, "london,uk");
    }

    #[tokio::test]
    async fn unknown_city_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        let err = provider.fetch("Atlantis").await.unwrap_err();

        match err {
            FetchError::Status { city, status, body } => {
                assert_eq!(city, "Atlantis");
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(body.contains("city not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "London"})))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        let err = provider.fetch("London").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn missing_condition_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "weather": [],
                "main": {"temp": 280.0, "humidity": 50}
            })))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        let err = provider.fetch("London").await.unwrap_err();
        assert!(matches!(err, FetchError::MissingField { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn empty_city_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri());
        match provider.fetch("   ").await {
            Err(FetchError::EmptyCity { city }) => assert_eq!(city, "   "),
            other => panic!("expected empty city error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_provider_is_request_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let provider =
            OpenWeatherProvider::with_base_url("KEY".into(), "http://127.0.0.1:9".into());
        let err = provider.fetch("London").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }), "got: {err:?}");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn debug_redacts_api_key() {
        let provider = OpenWeatherProvider::new("SECRET".into());
        let dbg = format!("{provider:?}");
        assert!(!dbg.contains("SECRET"));
        assert!(dbg.contains(DEFAULT_API_BASE_URL));
    }
}
