//! Per-city failure taxonomy.
//!
//! None of these abort a batch: the aggregator records them as skipped cities.

use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum CityError {
    #[error("coordinates not found for '{city}'")]
    NotFound { city: String },

    #[error("geocoding '{city}' failed: {source}")]
    Geocoding {
        city: String,
        #[source]
        source: ProviderError,
    },

    #[error("error fetching data for '{city}': {source}")]
    WeatherFetch {
        city: String,
        #[source]
        source: ProviderError,
    },
}

impl CityError {
    pub fn city(&self) -> &str {
        match self {
            Self::NotFound { city } | Self::Geocoding { city, .. } | Self::WeatherFetch { city, .. } => city,
        }
    }

    /// Which pipeline stage rejected the city.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Geocoding { .. } => "resolve",
            Self::WeatherFetch { .. } => "weather",
        }
    }
}
