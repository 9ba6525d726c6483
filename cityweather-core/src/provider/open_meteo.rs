use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};

use crate::model::{Coordinate, RawObservation};

use super::{Geocoder, ProviderError, WeatherSource, truncate_body};

const GEOCODING: &str = "geocoding";
const WEATHER: &str = "weather";

/// Name search against the Open-Meteo geocoding API.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    base_url: String,
    http: Client,
}

impl OpenMeteoGeocoder {
    pub fn new(base_url: String, http: Client) -> Self {
        Self { base_url, http }
    }
}

/// Current weather plus hourly relative humidity from the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoWeather {
    base_url: String,
    http: Client,
}

impl OpenMeteoWeather {
    pub fn new(base_url: String, http: Client) -> Self {
        Self { base_url, http }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeocodingResult>>,
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    #[tracing::instrument(name = "geocode", level = "debug", skip(self))]
    async fn lookup(&self, name: &str) -> Result<Option<Coordinate>, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[("name", name), ("count", "1")])
            .send()
            .await
            .map_err(|source| ProviderError::Transport { service: GEOCODING, source })?;

        let parsed: GeocodingResponse = read_json(GEOCODING, res).await?;

        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|r| Coordinate::new(r.latitude, r.longitude)))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoWeather {
    #[tracing::instrument(name = "current_weather", level = "debug", skip(self))]
    async fn observe(&self, coordinate: Coordinate) -> Result<RawObservation, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", coordinate.latitude.to_string()),
                ("longitude", coordinate.longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("hourly", "relativehumidity_2m".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::Transport { service: WEATHER, source })?;

        read_json(WEATHER, res).await
    }
}

async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    res: Response,
) -> Result<T, ProviderError> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| ProviderError::Transport { service, source })?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            service,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
        service,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(server: &MockServer) -> OpenMeteoGeocoder {
        OpenMeteoGeocoder::new(format!("{}/v1/search", server.uri()), Client::new())
    }

    fn weather(server: &MockServer) -> OpenMeteoWeather {
        OpenMeteoWeather::new(format!("{}/v1/forecast", server.uri()), Client::new())
    }

    #[tokio::test]
    async fn lookup_takes_first_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "New York"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"name": "New York", "latitude": 40.7128, "longitude": -74.0060},
                    {"name": "New York Mills", "latitude": 46.5180, "longitude": -95.3761}
                ]
            })))
            .mount(&server)
            .await;

        let found = geocoder(&server).lookup("New York").await.unwrap();
        assert_eq!(found, Some(Coordinate::new(40.7128, -74.0060)));
    }

    #[tokio::test]
    async fn lookup_empty_results_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
            .mount(&server)
            .await;

        assert_eq!(geocoder(&server).lookup("Atlantis").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lookup_missing_results_key_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"generationtime_ms": 0.5})))
            .mount(&server)
            .await;

        assert_eq!(geocoder(&server).lookup("Nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lookup_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = geocoder(&server).lookup("Paris").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, .. }));
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn observe_sends_expected_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "40.7128"))
            .and(query_param("longitude", "-74.006"))
            .and(query_param("current_weather", "true"))
            .and(query_param("hourly", "relativehumidity_2m"))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current_weather": {"temperature": 20.0, "windspeed": 5.0, "time": "2025-06-22T12:00"},
                "hourly": {
                    "time": ["2025-06-22T12:00", "2025-06-22T13:00"],
                    "relativehumidity_2m": [55, 60]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let raw = weather(&server)
            .observe(Coordinate::new(40.7128, -74.0060))
            .await
            .unwrap();

        let current = raw.current_weather.unwrap();
        assert_eq!(current.temperature, Some(20.0));
        assert_eq!(current.time.as_deref(), Some("2025-06-22T12:00"));
        assert_eq!(raw.hourly.unwrap().relative_humidity, Some(vec![Some(55.0), Some(60.0)]));
    }

    #[tokio::test]
    async fn observe_rejects_non_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = weather(&server).observe(Coordinate::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { service: "weather", .. }));
    }
}
