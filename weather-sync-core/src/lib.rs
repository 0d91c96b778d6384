//! Core library for the `weather-sync` tool.
//!
//! This crate defines:
//! - Layered configuration (file, environment, flags)
//! - The weather provider abstraction and the OpenWeather client
//! - Record persistence to a local directory and an S3 bucket
//! - The per-city pipeline driver and its run summary
//! - Bucket provisioning for public-read hosting of the records
//!
//! It is used by `weather-sync-cli`, but every stage takes its collaborators
//! explicitly so it can be driven with substitutes in tests.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod provision;
pub mod storage;

pub use config::{Config, Settings};
pub use error::{ConfigError, FetchError, LocalWriteError, ProvisionError, RemoteWriteError};
pub use model::WeatherRecord;
pub use pipeline::{CityOutcome, CityStatus, Pipeline, RunSummary};
pub use provider::WeatherProvider;
pub use storage::{ObjectStore, PersistResult, RecordWriter, RemoteOutcome};
