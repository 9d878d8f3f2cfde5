//! Station observation models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::TempCategory;

/// One observation row as returned by the provider, before cleaning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Provider station identifier
    pub station_id: Option<String>,
    /// Place name of the station
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Temperature in °F
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// Pressure in inHg
    pub pressure: Option<f64>,
    /// Wind speed in mph
    pub wind_speed: Option<f64>,
    /// Cardinal wind direction, e.g. `NW`
    pub wind_direction: Option<String>,
    /// Free-text weather description
    pub weather: Option<String>,
    /// ISO-8601 observation time
    pub timestamp: Option<String>,
}

/// A cleaned observation with valid coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station_id: Option<String>,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    /// Lower-cased, trimmed description
    pub weather: Option<String>,
    /// Icon derived from `weather`, the default icon when there is no description
    pub weather_icon: Option<String>,
    pub temp_category: Option<TempCategory>,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl Observation {
    /// Minimal observation at a point, mostly useful for tests and demos
    #[must_use]
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            station_id: None,
            name: None,
            latitude,
            longitude,
            temperature: None,
            humidity: None,
            pressure: None,
            wind_speed: None,
            wind_direction: None,
            weather: None,
            weather_icon: None,
            temp_category: None,
            timestamp: None,
        }
    }

    /// Builder-style temperature setter that keeps the category in sync
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self.temp_category = TempCategory::from_fahrenheit(temperature);
        self
    }

    /// Display name, falling back to the station id
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.station_id.as_deref())
            .unwrap_or("Weather Station")
    }
}
