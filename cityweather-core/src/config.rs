use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{builder::MissingReadings, model::default_cities, resolver::DEFAULT_CACHE_CAPACITY};

/// Public Open-Meteo endpoints, offered as defaults by `cityweather configure`.
pub const OPEN_METEO_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub const ENV_GEOCODING_URL: &str = "GEOCODING_URL";
pub const ENV_WEATHER_URL: &str = "OPEN_METEO_URL";
pub const ENV_TIMEOUT_SECS: &str = "CITYWEATHER_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENCY: &str = "CITYWEATHER_MAX_CONCURRENCY";
pub const ENV_CACHE_CAPACITY: &str = "CITYWEATHER_CACHE_CAPACITY";
pub const ENV_BIND: &str = "CITYWEATHER_BIND";

/// Optional dotenv file read from the working directory.
pub const DOTENV_FILE: &str = ".env";

/// Both service base URLs, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub geocoding_url: String,
    pub weather_url: String,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// geocoding_url = "https://geocoding-api.open-meteo.com/v1/search"
/// weather_url = "https://api.open-meteo.com/v1/forecast"
/// max_concurrency = 4
/// cities = ["Oslo", "Lima"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoding_url: Option<String>,
    pub weather_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Cities processed at the same time; 1 means strictly sequential.
    pub max_concurrency: usize,
    pub cache_capacity: usize,
    pub bind_address: String,
    pub export_path: PathBuf,
    pub missing_readings: MissingReadings,
    /// Replaces the preset city list when set.
    pub cities: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoding_url: None,
            weather_url: None,
            request_timeout_secs: 10,
            max_concurrency: 4,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            bind_address: "127.0.0.1:8000".to_string(),
            export_path: PathBuf::from("data/weather_data.csv"),
            missing_readings: MissingReadings::default(),
            cities: None,
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply environment overrides.
    ///
    /// Variables set in the process environment win over those in `.env`.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        let dotenv = read_dotenv(Path::new(DOTENV_FILE))?;
        cfg.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))?;
        Ok(cfg)
    }

    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cityweather", "cityweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Override fields from environment variables; `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_GEOCODING_URL) {
            self.geocoding_url = Some(url);
        }
        if let Some(url) = get(ENV_WEATHER_URL) {
            self.weather_url = Some(url);
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_env(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = parse_env(ENV_MAX_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = get(ENV_CACHE_CAPACITY) {
            self.cache_capacity = parse_env(ENV_CACHE_CAPACITY, &raw)?;
        }
        if let Some(bind) = get(ENV_BIND) {
            self.bind_address = bind;
        }

        Ok(())
    }

    /// Both base URLs; missing or non-HTTP values are a startup error.
    pub fn endpoints(&self) -> Result<Endpoints> {
        let geocoding_url = require_url(
            self.geocoding_url.as_deref(),
            "geocoding",
            ENV_GEOCODING_URL,
        )?;
        let weather_url = require_url(self.weather_url.as_deref(), "weather", ENV_WEATHER_URL)?;

        Ok(Endpoints {
            geocoding_url,
            weather_url,
        })
    }

    pub fn set_endpoints(&mut self, geocoding_url: String, weather_url: String) {
        self.geocoding_url = Some(geocoding_url);
        self.weather_url = Some(weather_url);
    }

    /// Configured city list, or the preset one.
    pub fn cities(&self) -> Vec<String> {
        match &self.cities {
            Some(cities) if !cities.is_empty() => cities.clone(),
            _ => default_cities(),
        }
    }
}

fn require_url(value: Option<&str>, service: &str, env_key: &str) -> Result<String> {
    let url = value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
        anyhow!(
            "No {service} URL configured.\n\
             Hint: set {env_key} or run `cityweather configure`."
        )
    })?;

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(anyhow!("The {service} URL must be an HTTP or HTTPS URL, got '{url}'"));
    }

    Ok(url.to_string())
}

/// Key/value pairs from a dotenv file, without touching the process environment.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let entries = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;

    entries
        .map(|entry| entry.with_context(|| format!("Failed to parse env file: {}", path.display())))
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow!("Invalid value '{raw}' for {key}: {e}"))
}
