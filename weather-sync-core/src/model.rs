use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Prefix under which every record is uploaded to the object store.
pub const REMOTE_KEY_PREFIX: &str = "weather-data";

/// One normalized observation for a configured city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// City exactly as it appears in the configured list.
    pub city: String,
    pub temperature_f: f64,
    pub humidity: u8,
    pub condition: String,
    /// Capture instant, assigned once when the provider answered.
    pub timestamp: DateTime<Utc>,
    /// Provider payload, byte for byte as received.
    pub raw: Box<RawValue>,
}

impl WeatherRecord {
    /// City name safe to use as a path component.
    pub fn city_slug(&self) -> String {
        slugify(&self.city)
    }

    /// Timestamp without separators, e.g. `20261018T093001123456Z`.
    pub fn compact_timestamp(&self) -> String {
        self.timestamp.format("%Y%m%dT%H%M%S%6fZ").to_string()
    }

    /// `{city}_{timestamp}.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.city_slug(), self.compact_timestamp())
    }

    /// `weather-data/{city}/{city}_{timestamp}.json`
    pub fn object_key(&self) -> String {
        format!("{REMOTE_KEY_PREFIX}/{}/{}", self.city_slug(), self.file_name())
    }

    /// One-line human summary, e.g. `London: 54.3°F, 81% humidity, light rain`.
    pub fn summary(&self) -> String {
        format!(
            "{}: {:.1}°F, {}% humidity, {}",
            self.city, self.temperature_f, self.humidity, self.condition
        )
    }
}

fn slugify(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    fn record(city: &str) -> WeatherRecord {
        WeatherRecord {
            city: city.to_string(),
            temperature_f: 54.32,
            humidity: 81,
            condition: "light rain".to_string(),
            timestamp: Utc
                .with_ymd_and_hms(2026, 10, 18, 9, 30, 1)
                .unwrap()
                .with_nanosecond(123_456_000)
                .unwrap(),
            raw: serde_json::value::to_raw_value(&json!({"name": city})).unwrap(),
        }
    }

    #[test]
    fn file_name_uses_compact_timestamp() {
        let r = record("London");
        assert_eq!(r.compact_timestamp(), "20261018T093001123456Z");
        assert_eq!(r.file_name(), "London_20261018T093001123456Z.json");
    }

    #[test]
    fn object_key_is_grouped_by_city() {
        let r = record("New York");
        assert_eq!(
            r.object_key(),
            "weather-data/New_York/New_York_20261018T093001123456Z.json"
        );
    }

    #[test]
    fn slug_never_contains_path_separators() {
        let r = record("../etc/ passwd");
        assert!(!r.city_slug().contains('/'));
        assert!(!r.file_name().contains('/'));
    }

    #[test]
    fn serialized_field_names_match_schema() {
        let value = serde_json::to_value(record("London")).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["city", "condition", "humidity", "raw", "temperature_f", "timestamp"]
        );
        assert!(obj["timestamp"].as_str().unwrap().starts_with("2026-10-18T09:30:01.123456"));
    }

    #[test]
    fn raw_payload_is_embedded_verbatim() {
        let mut r = record("London");
        r.raw = RawValue::from_string(r#"{"main":{"temp":285.50},"dt":1.0e2}"#.into()).unwrap();

        let text = serde_json::to_string_pretty(&r).unwrap();
        assert!(text.contains(r#""raw": {"main":{"temp":285.50},"dt":1.0e2}"#));

        let back: WeatherRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back.raw.get(), r.raw.get());
    }

    #[test]
    fn summary_line() {
        assert_eq!(record("London").summary(), "London: 54.3°F, 81% humidity, light rain");
    }
}
