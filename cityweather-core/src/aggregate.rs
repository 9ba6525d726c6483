use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::Serialize;

use crate::{
    Config,
    builder::{MissingReadings, RecordBuilder},
    error::CityError,
    model::{WeatherRecord, default_cities},
    provider::{Geocoder, WeatherSource, open_meteo_from_config},
    resolver::{CoordinateResolver, DEFAULT_CACHE_CAPACITY},
    table::WeatherTable,
};

/// A city left out of the table, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCity {
    pub city: String,
    pub stage: &'static str,
    pub reason: String,
}

impl From<&CityError> for SkippedCity {
    fn from(err: &CityError) -> Self {
        Self {
            city: err.city().to_string(),
            stage: err.stage(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationReport {
    pub table: WeatherTable,
    pub skipped: Vec<SkippedCity>,
}

/// Owns the coordinate cache and the service clients for the process lifetime.
#[derive(Debug)]
pub struct WeatherAggregator {
    resolver: CoordinateResolver,
    builder: RecordBuilder,
    max_concurrency: usize,
    default_cities: Vec<String>,
}

impl WeatherAggregator {
    pub fn new(geocoder: Arc<dyn Geocoder>, source: Arc<dyn WeatherSource>) -> Self {
        Self {
            resolver: CoordinateResolver::with_capacity(geocoder, DEFAULT_CACHE_CAPACITY),
            builder: RecordBuilder::new(source),
            max_concurrency: 1,
            default_cities: default_cities(),
        }
    }

    /// Build an aggregator over the Open-Meteo services described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (geocoder, source) = open_meteo_from_config(config)?;

        Ok(Self {
            resolver: CoordinateResolver::with_capacity(geocoder, config.cache_capacity),
            builder: RecordBuilder::new(source).with_missing_readings(config.missing_readings),
            max_concurrency: config.max_concurrency.max(1),
            default_cities: config.cities(),
        })
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_missing_readings(mut self, missing: MissingReadings) -> Self {
        self.builder = self.builder.with_missing_readings(missing);
        self
    }

    pub fn with_default_cities(mut self, cities: Vec<String>) -> Self {
        self.default_cities = cities;
        self
    }

    pub fn default_cities(&self) -> &[String] {
        &self.default_cities
    }

    pub fn resolver(&self) -> &CoordinateResolver {
        &self.resolver
    }

    /// Resolve and fetch one city.
    pub async fn fetch_city(&self, city: &str) -> Result<WeatherRecord, CityError> {
        let coordinate = self.resolver.try_resolve(city).await?;
        tracing::debug!(city, %coordinate, "resolved city");
        self.builder.build(city, coordinate).await
    }

    /// Table of the cities that succeeded, in input order. Failures are logged and dropped.
    pub async fn aggregate<S: AsRef<str>>(&self, cities: &[S]) -> WeatherTable {
        self.aggregate_with_report(cities).await.table
    }

    /// Aggregate the preset (or configured) city list.
    pub async fn aggregate_default(&self) -> AggregationReport {
        self.aggregate_with_report(&self.default_cities).await
    }

    /// Like [`aggregate`](Self::aggregate), also returning the skipped cities.
    ///
    /// Up to `max_concurrency` cities are in flight at once; results are
    /// collected in input order regardless of completion order.
    pub async fn aggregate_with_report<S: AsRef<str>>(&self, cities: &[S]) -> AggregationReport {
        let names: Vec<&str> = cities.iter().map(AsRef::as_ref).collect();
        let outcomes: futures::future::BoxFuture<'_, Vec<Result<WeatherRecord, CityError>>> =
            Box::pin(
                stream::iter(names)
                    .map(|city| self.fetch_city(city))
                    .buffered(self.max_concurrency)
                    .collect(),
            );
        let outcomes = outcomes.await;

        let mut report = AggregationReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(record) => report.table.push(record),
                Err(err) => {
                    match &err {
                        CityError::NotFound { city } => {
                            tracing::warn!(city = %city, "Skipping city: coordinates not found");
                        }
                        other => {
                            tracing::warn!(city = %other.city(), error = %other, "Skipping city");
                        }
                    }
                    report.skipped.push(SkippedCity::from(&err));
                }
            }
        }

        tracing::info!(
            requested = cities.len(),
            succeeded = report.table.len(),
            skipped = report.skipped.len(),
            "weather aggregation finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::{FakeWeather, sample_payload};
    use crate::resolver::tests::FakeGeocoder;
    use std::time::Duration;

    fn cities() -> Vec<(&'static str, f64, f64)> {
        vec![
            ("New York", 40.7128, -74.0060),
            ("Tokyo", 35.6895, 139.6917),
            ("London", 51.5074, -0.1278),
        ]
    }

    fn aggregator(geocoder: FakeGeocoder, weather: FakeWeather) -> WeatherAggregator {
        WeatherAggregator::new(Arc::new(geocoder), Arc::new(weather))
    }

    #[tokio::test]
    async fn unresolvable_city_is_skipped() {
        let agg = aggregator(
            FakeGeocoder::with(&cities()),
            FakeWeather::new(sample_payload(20.0, 5.0)),
        );

        let report = agg
            .aggregate_with_report(&["New York", "Atlantis", "Tokyo"])
            .await;

        let names: Vec<&str> = report.table.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, ["New York", "Tokyo"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].city, "Atlantis");
        assert_eq!(report.skipped[0].stage, "resolve");
    }

    #[tokio::test]
    async fn weather_failure_is_skipped() {
        let mut weather = FakeWeather::new(sample_payload(20.0, 5.0));
        weather.failing_latitudes.push(35.6895);
        let agg = aggregator(FakeGeocoder::with(&cities()), weather);

        let report = agg
            .aggregate_with_report(&["New York", "Tokyo", "London"])
            .await;

        let names: Vec<&str> = report.table.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, ["New York", "London"]);
        assert_eq!(report.skipped[0].stage, "weather");
        assert!(report.skipped[0].reason.contains("Tokyo"));
    }

    #[tokio::test]
    async fn all_failures_give_empty_table() {
        let agg = aggregator(
            FakeGeocoder::default(),
            FakeWeather::new(sample_payload(20.0, 5.0)),
        );

        let table = agg.aggregate(&["Atlantis", "El Dorado"]).await;
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn concurrent_run_keeps_input_order() {
        let mut geocoder = FakeGeocoder::with(&cities());
        geocoder.delay = Some(Duration::from_millis(5));
        let agg = aggregator(geocoder, FakeWeather::new(sample_payload(20.0, 5.0)))
            .with_max_concurrency(3);

        let table = agg.aggregate(&["London", "Tokyo", "New York"]).await;

        let names: Vec<&str> = table.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, ["London", "Tokyo", "New York"]);
    }

    #[tokio::test]
    async fn repeated_runs_are_identical_and_geocode_once() {
        let geocoder = Arc::new(FakeGeocoder::with(&cities()));
        let weather = Arc::new(FakeWeather::new(sample_payload(20.0, 5.0)));
        let agg = WeatherAggregator::new(geocoder.clone(), weather.clone());
        let names = ["New York", "Tokyo", "London"];

        let first = agg.aggregate(&names).await;
        let second = agg.aggregate(&names).await;

        assert_eq!(first, second);
        assert_eq!(geocoder.calls(), 3);
        assert_eq!(weather.calls(), 6);
    }

    #[tokio::test]
    async fn default_list_is_used() {
        let geocoder = Arc::new(FakeGeocoder::with(&cities()));
        let agg = WeatherAggregator::new(geocoder.clone(), Arc::new(FakeWeather::new(sample_payload(1.0, 1.0))));

        let report = agg.aggregate_default().await;

        assert_eq!(geocoder.calls(), 10);
        assert_eq!(report.table.len() + report.skipped.len(), 10);
        assert_eq!(report.table.records()[0].city, "New York");
    }

    #[tokio::test]
    async fn custom_default_list() {
        let agg = aggregator(
            FakeGeocoder::with(&cities()),
            FakeWeather::new(sample_payload(1.0, 1.0)),
        )
        .with_default_cities(vec!["Tokyo".into()]);

        let report = agg.aggregate_default().await;
        assert_eq!(report.table.len(), 1);
        assert!(report.skipped.is_empty());
    }
}
