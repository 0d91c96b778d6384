use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;

pub const DEFAULT_REGION: &str = "ap-south-1";
pub const DEFAULT_OUTPUT_DIR: &str = "docs";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openweathermap.org";

/// Environment variables recognized for each option, first match wins.
const ENV_API_KEY: &[&str] = &["API_KEY", "OPENWEATHER_API_KEY"];
const ENV_REGION: &[&str] = &["REGION", "AWS_REGION"];
const ENV_BUCKET: &[&str] = &["BUCKET_NAME", "S3_BUCKET_NAME"];
const ENV_CITIES: &[&str] = &["CITIES"];
const ENV_OUTPUT_DIR: &[&str] = &["OUTPUT_DIR"];
const ENV_BASE_URL: &[&str] = &["OPENWEATHER_BASE_URL"];

/// Raw, possibly incomplete configuration.
///
/// Built from the config file, then overlaid with the environment and CLI
/// flags. Call [`Config::resolve`] to validate it into [`Settings`].
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// bucket_name = "my-weather-bucket"
/// cities = ["London", "New York"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub region: Option<String>,
    /// Absent means remote writes are disabled.
    pub bucket_name: Option<String>,
    pub cities: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub api_base_url: Option<String>,
}

/// Validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub region: String,
    pub bucket_name: Option<String>,
    pub cities: Vec<String>,
    pub output_dir: PathBuf,
    pub api_base_url: String,
}

impl Settings {
    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        self.bucket_name.as_deref().ok_or(ConfigError::MissingBucket)
    }
}

impl Config {
    /// Load config from the default location, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-sync", "weather-sync")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the process environment, after loading `.env` if present.
    ///
    /// Variables already set in the environment take precedence over `.env`.
    pub fn apply_process_env(&mut self) {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Overlay values from an arbitrary variable lookup. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = get(ENV_REGION) {
            self.region = Some(v);
        }
        if let Some(v) = get(ENV_BUCKET) {
            self.bucket_name = Some(v);
        }
        if let Some(v) = get(ENV_CITIES) {
            self.cities = parse_cities(&v);
        }
        if let Some(v) = get(ENV_OUTPUT_DIR) {
            self.output_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_BASE_URL) {
            self.api_base_url = Some(v);
        }
    }

    /// Validate into [`Settings`], filling defaults.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let api_key = non_empty(self.api_key.as_deref()).ok_or(ConfigError::MissingApiKey)?;

        let cities: Vec<String> = self
            .cities
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if cities.is_empty() {
            return Err(ConfigError::NoCities);
        }

        Ok(Settings {
            api_key,
            region: non_empty(self.region.as_deref()).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket_name: non_empty(self.bucket_name.as_deref()),
            cities,
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            api_base_url: non_empty(self.api_base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        })
    }
}

/// Split a comma-separated city list, keeping order and duplicates.
pub fn parse_cities(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
