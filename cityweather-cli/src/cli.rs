use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cityweather_core::{
    AggregationReport, Config, SortOrder, WeatherAggregator, WeatherField, WeatherRecord,
    config::{OPEN_METEO_FORECAST_URL, OPEN_METEO_GEOCODING_URL},
};

use crate::server::{self, AppState};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Current weather for a list of cities")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the geocoding and weather service URLs.
    Configure,

    /// Fetch current weather for cities (the preset list when none are given).
    Fetch {
        cities: Vec<String>,

        /// Also write the table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print JSON instead of a text table.
        #[arg(long)]
        json: bool,
    },

    /// Rank cities by a numeric column, e.g. `temperature_c` or `humidity_pct`.
    Top {
        field: WeatherField,

        #[arg(short, default_value_t = 5)]
        n: usize,

        /// Lowest values first.
        #[arg(long)]
        asc: bool,

        cities: Vec<String>,
    },

    /// Serve the weather table over HTTP.
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:8000.
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Cli {
    pub fn default_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Fetch { cities, csv, json } => {
                let config = Config::load()?;
                let report = aggregate(&config, cities).await?;

                if let Some(path) = csv {
                    report.table.export_csv(&path)?;
                    println!("Wrote {} rows to {}", report.table.len(), path.display());
                }

                if json {
                    let out = serde_json::to_string_pretty(&report)
                        .context("Failed to serialize weather report")?;
                    println!("{out}");
                } else {
                    print_records(report.table.records());
                    print_skipped(&report);
                }
                Ok(())
            }
            Command::Top { field, n, asc, cities } => {
                let config = Config::load()?;
                let report = aggregate(&config, cities).await?;
                let order = if asc { SortOrder::Asc } else { SortOrder::Desc };

                let ranked: Vec<WeatherRecord> =
                    report.table.top_n(field, n, order).into_iter().cloned().collect();
                print_records(&ranked);
                print_skipped(&report);
                Ok(())
            }
            Command::Serve { bind } => {
                let config = Config::load()?;
                let bind = bind.unwrap_or_else(|| config.bind_address.clone());
                let aggregator = WeatherAggregator::from_config(&config)?;

                let state = AppState::bootstrap(aggregator, config.export_path.clone()).await;
                server::run(state, &bind).await
            }
        }
    }
}

async fn aggregate(config: &Config, cities: Vec<String>) -> anyhow::Result<AggregationReport> {
    let aggregator = WeatherAggregator::from_config(config)?;

    let report = if cities.is_empty() {
        aggregator.aggregate_default().await
    } else {
        aggregator.aggregate_with_report(&cities).await
    };
    Ok(report)
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let geocoding = inquire::Text::new("Geocoding API URL:")
        .with_default(config.geocoding_url.as_deref().unwrap_or(OPEN_METEO_GEOCODING_URL))
        .prompt()
        .context("Failed to read geocoding URL")?;

    let weather = inquire::Text::new("Weather API URL:")
        .with_default(config.weather_url.as_deref().unwrap_or(OPEN_METEO_FORECAST_URL))
        .prompt()
        .context("Failed to read weather URL")?;

    config.set_endpoints(geocoding.trim().to_string(), weather.trim().to_string());
    config.endpoints()?;

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn print_records(records: &[WeatherRecord]) {
    if records.is_empty() {
        println!("No weather data available.");
        return;
    }

    let width = records
        .iter()
        .map(|r| r.city.chars().count())
        .max()
        .unwrap_or(0)
        .max("City".len());

    print!("{:<width$}", "City");
    for field in WeatherField::all() {
        print!("  {:>16}", field.header());
    }
    println!();

    for record in records {
        print!("{:<width$}", record.city);
        for field in WeatherField::all() {
            print!("  {:>16}", cell(field.value(record)));
        }
        println!();
    }
}

fn print_skipped(report: &AggregationReport) {
    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.city, skipped.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_top_command() {
        let cli = Cli::try_parse_from(["cityweather", "top", "humidity_pct", "-n", "3", "--asc", "Oslo", "Lima"])
            .unwrap();

        match cli.command {
            Command::Top { field, n, asc, cities } => {
                assert_eq!(field, WeatherField::HumidityPct);
                assert_eq!(n, 3);
                assert!(asc);
                assert_eq!(cities, ["Oslo", "Lima"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_field() {
        assert!(Cli::try_parse_from(["cityweather", "top", "pressure"]).is_err());
    }

    #[test]
    fn verbose_switches_log_level() {
        let cli = Cli::try_parse_from(["cityweather", "-v", "fetch"]).unwrap();
        assert_eq!(cli.default_log_level(), "debug");

        let cli = Cli::try_parse_from(["cityweather", "fetch", "Tokyo", "--json"]).unwrap();
        assert_eq!(cli.default_log_level(), "info");
    }

    #[test]
    fn missing_cells_render_as_dash() {
        assert_eq!(cell(None), "-");
        assert_eq!(cell(Some(11.184)), "11.18");
    }
}
