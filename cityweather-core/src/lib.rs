//! Core library for the `cityweather` tool.
//!
//! This crate defines:
//! - The aggregation pipeline: city name → coordinate → current weather → normalized record
//! - Configuration & service endpoints
//! - The resulting table with ranking, CSV export and bar charts
//!
//! It is used by `cityweather-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod builder;
pub mod chart;
pub mod config;
pub mod error;
pub mod humidity;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod table;
pub mod units;

pub use aggregate::{AggregationReport, SkippedCity, WeatherAggregator};
pub use builder::{MissingReadings, RecordBuilder};
pub use config::{Config, Endpoints};
pub use error::CityError;
pub use model::{Coordinate, DEFAULT_CITIES, RawObservation, SortOrder, WeatherField, WeatherRecord};
pub use provider::{Geocoder, ProviderError, WeatherSource};
pub use resolver::CoordinateResolver;
pub use table::WeatherTable;
