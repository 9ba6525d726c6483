//! Picks the hourly humidity sample closest in time to the current reading.
//!
//! The current-weather timestamp rarely falls exactly on the hourly grid
//! (e.g. 14:15 against 14:00/15:00), so an exact match would drop humidity
//! for most cities. The sample with the smallest absolute distance wins; on
//! a tie the earlier index wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::{CurrentConditions, HourlySeries};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a provider timestamp into a comparable instant.
///
/// Open-Meteo reports local wall-clock time without an offset
/// (`2025-06-22T12:00`). Offset-qualified timestamps are normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Humidity at the hourly slot nearest to `reference`.
///
/// `timestamps[i]` pairs with `humidity[i]`; extra entries on the longer side
/// are ignored and unparseable timestamps are skipped. Returns `None` when
/// the reference cannot be parsed, no slot is usable, or the selected slot
/// carries no value.
pub fn reconcile(reference: &str, timestamps: &[String], humidity: &[Option<f64>]) -> Option<f64> {
    let reference = parse_timestamp(reference)?;

    timestamps
        .iter()
        .zip(humidity)
        .filter_map(|(ts, value)| parse_timestamp(ts).map(|instant| (instant, *value)))
        .min_by_key(|(instant, _)| (*instant - reference).num_seconds().abs())
        .and_then(|(_, value)| value)
}

/// [`reconcile`] over the optional blocks of a weather payload.
pub fn reconcile_observation(
    current: Option<&CurrentConditions>,
    hourly: Option<&HourlySeries>,
) -> Option<f64> {
    let reference = current?.time.as_deref()?;
    let hourly = hourly?;
    let timestamps = hourly.time.as_deref()?;
    let humidity = hourly.relative_humidity.as_deref()?;

    reconcile(reference, timestamps, humidity)
}
