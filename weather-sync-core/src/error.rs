//! Error types for each stage of a run.
//!
//! Per-city errors ([`FetchError`], [`LocalWriteError`], [`RemoteWriteError`])
//! always name the city they belong to, so the driver can report them without
//! extra bookkeeping.

use std::path::PathBuf;

use crate::provision::ProvisionStep;

/// Boxed cause used at the object-store seam, where SDK error types vary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid or incomplete configuration. Aborts a run before any city is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "No API key configured.\n\
         Hint: set API_KEY (or OPENWEATHER_API_KEY) or run `weather-sync configure`."
    )]
    MissingApiKey,

    #[error(
        "No cities configured.\n\
         Hint: set CITIES to a comma-separated list, e.g. CITIES=London,Paris."
    )]
    NoCities,

    #[error("No bucket configured.\nHint: set BUCKET_NAME or pass --bucket.")]
    MissingBucket,
}

/// The provider could not produce a complete record for a city.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("city name is empty: {city:?}")]
    EmptyCity { city: String },

    #[error("request for '{city}' failed: {source}")]
    Request {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider rejected '{city}' with status {status}: {body}")]
    Status {
        city: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not parse provider response for '{city}': {source}")]
    Parse {
        city: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("provider response for '{city}' has no {field}")]
    MissingField { city: String, field: &'static str },
}

impl FetchError {
    pub fn city(&self) -> &str {
        match self {
            FetchError::EmptyCity { city }
            | FetchError::Request { city, .. }
            | FetchError::Status { city, .. }
            | FetchError::Parse { city, .. }
            | FetchError::MissingField { city, .. } => city,
        }
    }
}

/// Writing the record to the local output directory failed.
#[derive(Debug, thiserror::Error)]
pub enum LocalWriteError {
    #[error("could not encode record for '{city}': {source}")]
    Encode {
        city: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not create output directory {} for '{city}': {source}", .path.display())]
    CreateDir {
        city: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {} for '{city}': {source}", .path.display())]
    Write {
        city: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LocalWriteError {
    pub fn city(&self) -> &str {
        match self {
            LocalWriteError::Encode { city, .. }
            | LocalWriteError::CreateDir { city, .. }
            | LocalWriteError::Write { city, .. } => city,
        }
    }
}

/// Uploading the record to the object store failed.
#[derive(Debug, thiserror::Error)]
#[error("could not upload '{city}' to s3://{bucket}/{key}: {source}")]
pub struct RemoteWriteError {
    pub city: String,
    pub bucket: String,
    pub key: String,
    #[source]
    pub source: BoxError,
}

/// A provisioning step was rejected; later steps were not attempted.
#[derive(Debug, thiserror::Error)]
#[error("provisioning step '{step}' failed for bucket '{bucket}': {source}")]
pub struct ProvisionError {
    pub step: ProvisionStep,
    pub bucket: String,
    #[source]
    pub source: BoxError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_carry_hints() {
        assert!(ConfigError::MissingApiKey.to_string().contains("API_KEY"));
        assert!(ConfigError::NoCities.to_string().contains("CITIES"));
    }

    #[test]
    fn fetch_error_names_city() {
        let err = FetchError::MissingField { city: "Oslo".into(), field: "weather[0]" };
        assert_eq!(err.city(), "Oslo");
        assert!(err.to_string().contains("Oslo"));

        let empty = FetchError::EmptyCity { city: "  ".into() };
        assert_eq!(empty.city(), "  ");
        assert_eq!(empty.to_string(), r#"city name is empty: "  ""#);
    }

    #[test]
    fn local_write_error_names_path() {
        let err = LocalWriteError::Write {
            city: "Lima".into(),
            path: PathBuf::from("docs/Lima.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.city(), "Lima");
        let msg = err.to_string();
        assert!(msg.contains("docs/Lima.json"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn remote_write_error_displays_location() {
        let err = RemoteWriteError {
            city: "Lima".into(),
            bucket: "wx".into(),
            key: "weather-data/Lima/x.json".into(),
            source: "unreachable".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not upload 'Lima' to s3://wx/weather-data/Lima/x.json: unreachable"
        );
    }
}
