use crate::{
    Config,
    model::{Coordinate, RawObservation},
    provider::open_meteo::{OpenMeteoGeocoder, OpenMeteoWeather},
};
use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, sync::Arc, time::Duration};
use thiserror::Error;

pub mod open_meteo;

/// Failure talking to one of the external services.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} request failed with status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to parse {service} response: {detail}")]
    Malformed { service: &'static str, detail: String },
}

/// Maps a place name to the best-ranked coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// `Ok(None)` means the service answered but found no match.
    async fn lookup(&self, name: &str) -> Result<Option<Coordinate>, ProviderError>;
}

/// Fetches current conditions plus the hourly humidity series for a coordinate.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn observe(&self, coordinate: Coordinate) -> Result<RawObservation, ProviderError>;
}

/// Shared HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("cityweather/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Construct the Open-Meteo clients from config.
pub fn open_meteo_from_config(
    config: &Config,
) -> anyhow::Result<(Arc<dyn Geocoder>, Arc<dyn WeatherSource>)> {
    let endpoints = config.endpoints()?;
    let http = http_client(Duration::from_secs(config.request_timeout_secs))?;

    let geocoder: Arc<dyn Geocoder> =
        Arc::new(OpenMeteoGeocoder::new(endpoints.geocoding_url, http.clone()));
    let weather: Arc<dyn WeatherSource> =
        Arc::new(OpenMeteoWeather::new(endpoints.weather_url, http));

    Ok((geocoder, weather))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
