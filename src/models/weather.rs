//! Temperature categories, weather icons and heatmap metrics

use serde::{Deserialize, Serialize};

use super::Observation;

/// Fallback icon for unrecognised conditions
pub const DEFAULT_WEATHER_ICON: &str = "🌤️";

/// Temperature bucket using right-closed bins on °F:
/// (-inf, 32], (32, 50], (50, 70], (70, 90], (90, inf)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TempCategory {
    Freezing,
    Cold,
    Cool,
    Warm,
    Hot,
}

impl TempCategory {
    /// Categorise a temperature in °F
    #[must_use]
    pub fn from_fahrenheit(temp_f: f64) -> Option<Self> {
        if !temp_f.is_finite() {
            return None;
        }
        Some(match temp_f {
            t if t <= 32.0 => Self::Freezing,
            t if t <= 50.0 => Self::Cold,
            t if t <= 70.0 => Self::Cool,
            t if t <= 90.0 => Self::Warm,
            _ => Self::Hot,
        })
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Freezing => "Freezing",
            Self::Cold => "Cold",
            Self::Cool => "Cool",
            Self::Warm => "Warm",
            Self::Hot => "Hot",
        }
    }
}

/// Map a normalised weather description to an icon
#[must_use]
pub fn weather_icon(description: &str) -> &'static str {
    match description {
        "clear" | "sunny" => "☀️",
        "partly cloudy" => "⛅",
        "cloudy" | "overcast" => "☁️",
        "rain" => "🌧️",
        "showers" => "🌦️",
        "thunderstorm" => "⛈️",
        "snow" => "❄️",
        "fog" | "haze" => "🌫️",
        _ => DEFAULT_WEATHER_ICON,
    }
}

/// Lower-case and trim a provider weather description
#[must_use]
pub fn normalize_description(description: &str) -> String {
    description.trim().to_lowercase()
}

/// Observation column used as heatmap intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
}

impl Metric {
    /// Read this metric from an observation
    #[must_use]
    pub fn value(self, observation: &Observation) -> Option<f64> {
        match self {
            Self::Temperature => observation.temperature,
            Self::Humidity => observation.humidity,
            Self::Pressure => observation.pressure,
            Self::WindSpeed => observation.wind_speed,
        }
    }
}
