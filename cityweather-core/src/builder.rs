use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::CityError,
    humidity,
    model::{Coordinate, RawObservation, WeatherRecord},
    provider::WeatherSource,
    units::{to_fahrenheit, to_mph},
};

/// What to derive when the payload lacks temperature or wind speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReadings {
    /// Derive from 0 (32 °F / 0 mph), leaving the source column absent.
    #[default]
    ZeroFill,
    /// Derived columns are absent too.
    Propagate,
}

impl MissingReadings {
    fn derive(&self, reading: Option<f64>, convert: fn(f64) -> f64) -> Option<f64> {
        match (self, reading) {
            (_, Some(value)) => Some(convert(value)),
            (MissingReadings::Propagate, None) => None,
            (MissingReadings::ZeroFill, None) => Some(convert(0.0)),
        }
    }
}

/// Turns one coordinate into one normalized record. Never cached.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    source: Arc<dyn WeatherSource>,
    missing: MissingReadings,
}

impl RecordBuilder {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self {
            source,
            missing: MissingReadings::default(),
        }
    }

    pub fn with_missing_readings(mut self, missing: MissingReadings) -> Self {
        self.missing = missing;
        self
    }

    pub async fn build(&self, city: &str, coordinate: Coordinate) -> Result<WeatherRecord, CityError> {
        let raw = self
            .source
            .observe(coordinate)
            .await
            .map_err(|source| CityError::WeatherFetch {
                city: city.to_string(),
                source,
            })?;

        Ok(self.normalize(city, &raw))
    }

    /// Build a record from an already fetched payload.
    pub fn normalize(&self, city: &str, raw: &RawObservation) -> WeatherRecord {
        let current = raw.current_weather.as_ref();
        let temperature_c = current.and_then(|c| c.temperature);
        let wind_speed_ms = current.and_then(|c| c.windspeed);

        WeatherRecord {
            city: city.to_string(),
            temperature_c,
            temperature_f: self.missing.derive(temperature_c, to_fahrenheit),
            humidity_pct: humidity::reconcile_observation(current, raw.hourly.as_ref()),
            wind_speed_ms,
            wind_speed_mph: self.missing.derive(wind_speed_ms, to_mph),
        }
    }
}
