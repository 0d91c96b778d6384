use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{Settings, WeatherRecord, error::FetchError, provider::openweather::OpenWeatherProvider};

pub mod openweather;

/// Source of current observations for a city.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Issue exactly one request for `city` and normalize the answer.
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError>;
}

#[async_trait]
impl<T: WeatherProvider + ?Sized> WeatherProvider for Arc<T> {
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError> {
        (**self).fetch(city).await
    }
}

/// Construct the provider described by resolved settings.
pub fn provider_from_settings(settings: &Settings) -> Box<dyn WeatherProvider> {
    Box::new(OpenWeatherProvider::with_base_url(
        settings.api_key.clone(),
        settings.api_base_url.clone(),
    ))
}

/// Kelvin to Fahrenheit, without rounding.
pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - 273.15) * 9.0 / 5.0 + 32.0
}
