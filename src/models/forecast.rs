//! Forecast period models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One forecast period as returned by the provider, before cleaning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Request latitude; forecasts are point forecasts
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// ISO-8601 period start
    pub datetime: Option<String>,
    /// Max temperature in °F
    pub temperature_max: Option<f64>,
    /// Min temperature in °F
    pub temperature_min: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    pub weather: Option<String>,
    /// Precipitation amount in inches
    pub precipitation_in: Option<f64>,
    /// Snowfall in inches
    pub snow_in: Option<f64>,
}

/// A cleaned forecast period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub latitude: f64,
    pub longitude: f64,
    pub datetime: Option<DateTime<FixedOffset>>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    pub weather: Option<String>,
    pub weather_icon: Option<String>,
    pub precipitation_in: Option<f64>,
    pub snow_in: Option<f64>,
}

impl ForecastPeriod {
    /// Period date as `YYYY-MM-DD`, or `N/A`
    #[must_use]
    pub fn date_label(&self) -> String {
        self.datetime
            .map_or_else(|| "N/A".to_string(), |dt| dt.format("%Y-%m-%d").to_string())
    }
}
