use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt, str::FromStr};

/// Cities aggregated when no explicit list is supplied.
pub const DEFAULT_CITIES: [&str; 10] = [
    "New York",
    "Tokyo",
    "London",
    "Paris",
    "Berlin",
    "Sydney",
    "Mumbai",
    "Cape Town",
    "Moscow",
    "Rio de Janeiro",
];

pub fn default_cities() -> Vec<String> {
    DEFAULT_CITIES.iter().map(|c| c.to_string()).collect()
}

/// A resolved latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// The instantaneous reading from the weather service.
///
/// Every field is optional: a partial payload degrades the record instead of
/// failing the city.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentConditions {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub windspeed: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
}

/// Hourly series; `time[i]` corresponds to `relative_humidity[i]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Option<Vec<String>>,
    #[serde(default, rename = "relativehumidity_2m", alias = "relative_humidity_2m")]
    pub relative_humidity: Option<Vec<Option<f64>>>,
}

/// Weather service payload, limited to the parts the pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawObservation {
    #[serde(default)]
    pub current_weather: Option<CurrentConditions>,
    #[serde(default)]
    pub hourly: Option<HourlySeries>,
}

/// One normalized row of the weather table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub temperature_c: Option<f64>,
    pub temperature_f: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_speed_mph: Option<f64>,
}

/// Numeric columns of the table, used as ranking and chart keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherField {
    TemperatureC,
    TemperatureF,
    HumidityPct,
    WindSpeedMs,
    WindSpeedMph,
}

impl WeatherField {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherField::TemperatureC => "temperature_c",
            WeatherField::TemperatureF => "temperature_f",
            WeatherField::HumidityPct => "humidity_pct",
            WeatherField::WindSpeedMs => "wind_speed_ms",
            WeatherField::WindSpeedMph => "wind_speed_mph",
        }
    }

    /// Column header used in the CSV export.
    pub fn header(&self) -> &'static str {
        match self {
            WeatherField::TemperatureC => "Temperature (C)",
            WeatherField::TemperatureF => "Temperature (F)",
            WeatherField::HumidityPct => "Humidity (%)",
            WeatherField::WindSpeedMs => "Wind Speed (m/s)",
            WeatherField::WindSpeedMph => "Wind Speed (mph)",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            WeatherField::TemperatureC => "°C",
            WeatherField::TemperatureF => "°F",
            WeatherField::HumidityPct => "%",
            WeatherField::WindSpeedMs => "m/s",
            WeatherField::WindSpeedMph => "mph",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WeatherField::TemperatureC | WeatherField::TemperatureF => "Temperature by City",
            WeatherField::HumidityPct => "Humidity by City",
            WeatherField::WindSpeedMs | WeatherField::WindSpeedMph => "Wind Speed by City",
        }
    }

    pub fn value(&self, record: &WeatherRecord) -> Option<f64> {
        match self {
            WeatherField::TemperatureC => record.temperature_c,
            WeatherField::TemperatureF => record.temperature_f,
            WeatherField::HumidityPct => record.humidity_pct,
            WeatherField::WindSpeedMs => record.wind_speed_ms,
            WeatherField::WindSpeedMph => record.wind_speed_mph,
        }
    }

    pub const fn all() -> &'static [WeatherField] {
        &[
            WeatherField::TemperatureC,
            WeatherField::TemperatureF,
            WeatherField::HumidityPct,
            WeatherField::WindSpeedMs,
            WeatherField::WindSpeedMph,
        ]
    }
}

impl fmt::Display for WeatherField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for WeatherField {
    type Error = anyhow::Error;

    /// Accepts the snake_case key or the CSV header, case-insensitively.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let wanted = value.trim();

        WeatherField::all()
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(wanted) || f.header().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = WeatherField::all().iter().map(|f| f.as_str()).collect();
                anyhow::anyhow!("Unknown column '{value}'. Supported columns: {}.", known.join(", "))
            })
    }
}

impl FromStr for WeatherField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeatherField::try_from(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}
