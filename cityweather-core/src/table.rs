use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{SortOrder, WeatherField, WeatherRecord};

/// Records for the cities that made it through the pipeline, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherTable {
    records: Vec<WeatherRecord>,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "City")]
    city: &'a str,
    #[serde(rename = "Temperature (C)")]
    temperature_c: Option<f64>,
    #[serde(rename = "Temperature (F)")]
    temperature_f: Option<f64>,
    #[serde(rename = "Humidity (%)")]
    humidity_pct: Option<f64>,
    #[serde(rename = "Wind Speed (m/s)")]
    wind_speed_ms: Option<f64>,
    #[serde(rename = "Wind Speed (mph)")]
    wind_speed_mph: Option<f64>,
}

impl<'a> From<&'a WeatherRecord> for CsvRow<'a> {
    fn from(r: &'a WeatherRecord) -> Self {
        Self {
            city: &r.city,
            temperature_c: r.temperature_c,
            temperature_f: r.temperature_f,
            humidity_pct: r.humidity_pct,
            wind_speed_ms: r.wind_speed_ms,
            wind_speed_mph: r.wind_speed_mph,
        }
    }
}

impl WeatherTable {
    pub fn new(records: Vec<WeatherRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: WeatherRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<WeatherRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeatherRecord> {
        self.records.iter()
    }

    /// Records carrying `field`, sorted by it. Equal values keep table order.
    pub fn sorted_by(&self, field: WeatherField, order: SortOrder) -> Vec<&WeatherRecord> {
        let mut rows: Vec<(&WeatherRecord, f64)> = self
            .records
            .iter()
            .filter_map(|r| field.value(r).map(|v| (r, v)))
            .collect();

        rows.sort_by(|(_, a), (_, b)| match order {
            SortOrder::Asc => a.total_cmp(b),
            SortOrder::Desc => b.total_cmp(a),
        });

        rows.into_iter().map(|(r, _)| r).collect()
    }

    /// The first `n` records ranked by `field`.
    pub fn top_n(&self, field: WeatherField, n: usize, order: SortOrder) -> Vec<&WeatherRecord> {
        let mut ranked = self.sorted_by(field, order);
        ranked.truncate(n);
        ranked
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        if self.records.is_empty() {
            let mut header = vec!["City"];
            header.extend(WeatherField::all().iter().map(|f| f.header()));
            csv.write_record(&header).context("Failed to write CSV header")?;
        }
        for record in &self.records {
            csv.serialize(CsvRow::from(record))
                .with_context(|| format!("Failed to write CSV row for {}", record.city))?;
        }
        csv.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).context("CSV output was not valid UTF-8")
    }

    /// Write the table as CSV to `path`, creating parent directories as needed.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create export directory: {}", parent.display())
            })?;
        }

        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        self.write_csv(file)
    }
}

impl FromIterator<WeatherRecord> for WeatherTable {
    fn from_iter<I: IntoIterator<Item = WeatherRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a WeatherTable {
    type Item = &'a WeatherRecord;
    type IntoIter = std::slice::Iter<'a, WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(city: &str, temp: Option<f64>, humidity: Option<f64>) -> WeatherRecord {
        WeatherRecord {
            city: city.to_string(),
            temperature_c: temp,
            temperature_f: temp.map(crate::units::to_fahrenheit),
            humidity_pct: humidity,
            wind_speed_ms: Some(3.0),
            wind_speed_mph: Some(crate::units::to_mph(3.0)),
        }
    }

    fn sample() -> WeatherTable {
        WeatherTable::new(vec![
            record("London", Some(14.0), Some(81.0)),
            record("Tokyo", Some(27.5), None),
            record("Moscow", Some(9.0), Some(70.0)),
            record("Sydney", Some(14.0), Some(64.0)),
        ])
    }

    fn cities(rows: &[&WeatherRecord]) -> Vec<String> {
        rows.iter().map(|r| r.city.clone()).collect()
    }

    #[test]
    fn top_n_descending() {
        let table = sample();
        let top = table.top_n(WeatherField::TemperatureC, 3, SortOrder::Desc);
        assert_eq!(cities(&top), ["Tokyo", "London", "Sydney"]);
    }

    #[test]
    fn top_n_ascending() {
        let table = sample();
        let top = table.top_n(WeatherField::TemperatureC, 2, SortOrder::Asc);
        assert_eq!(cities(&top), ["Moscow", "London"]);
    }

    #[test]
    fn ranking_skips_absent_values() {
        let table = sample();
        let ranked = table.top_n(WeatherField::HumidityPct, 10, SortOrder::Desc);
        assert_eq!(cities(&ranked), ["London", "Moscow", "Sydney"]);
    }

    #[test]
    fn csv_export_uses_display_headers() {
        let csv = sample().to_csv_string().unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "City,Temperature (C),Temperature (F),Humidity (%),Wind Speed (m/s),Wind Speed (mph)"
        );
        assert_eq!(lines.next().unwrap(), "London,14.0,57.2,81.0,3.0,6.71");
        assert_eq!(lines.next().unwrap(), "Tokyo,27.5,81.5,,3.0,6.71");
    }

    #[test]
    fn empty_table_still_has_header() {
        let csv = WeatherTable::default().to_csv_string().unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("City,"));
    }

    #[test]
    fn export_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("weather_data.csv");

        sample().export_csv(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 5);
    }

    #[test]
    fn serializes_as_plain_array() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.is_array());
        assert_eq!(json[1]["city"], "Tokyo");
        assert!(json[1]["humidity_pct"].is_null());
    }
}
