//! Unit conversions applied to every record.

pub const CELSIUS_TO_FAHRENHEIT_SCALE: f64 = 9.0 / 5.0;
pub const CELSIUS_TO_FAHRENHEIT_OFFSET: f64 = 32.0;
pub const MPS_TO_MPH: f64 = 2.23694;

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Celsius to Fahrenheit, rounded to two decimals.
pub fn to_fahrenheit(celsius: f64) -> f64 {
    round2(celsius * CELSIUS_TO_FAHRENHEIT_SCALE + CELSIUS_TO_FAHRENHEIT_OFFSET)
}

/// Metres per second to miles per hour, rounded to two decimals.
pub fn to_mph(meters_per_second: f64) -> f64 {
    round2(meters_per_second * MPS_TO_MPH)
}
