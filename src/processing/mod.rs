//! Weather data processing
//!
//! Turns raw provider rows into cleaned observations and forecast periods and
//! derives the aggregates the map draws: grid cells, temperature zones,
//! station gradients and heatmap points.

pub mod gradients;
pub mod grid;
pub mod heatmap;
pub mod zones;

pub use gradients::StationGradient;
pub use grid::GridCell;
pub use heatmap::HeatmapPoint;
pub use zones::{WeatherZone, ZoneKind};

use crate::config::ProcessingConfig;
use crate::models::location::is_valid_coordinate;
use crate::models::weather::{DEFAULT_WEATHER_ICON, normalize_description, weather_icon};
use crate::models::{
    ForecastPeriod, ForecastRecord, Metric, Observation, ObservationRecord, TempCategory,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything the map builder needs for one area
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedWeather {
    pub observations: Vec<Observation>,
    pub grid: Vec<GridCell>,
    pub zones: Vec<WeatherZone>,
    pub gradients: Vec<StationGradient>,
    pub forecast: Vec<ForecastPeriod>,
}

impl ProcessedWeather {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.forecast.is_empty()
    }
}

/// Processor for cleaning and structuring weather data
#[derive(Debug, Clone)]
pub struct WeatherDataProcessor {
    grid_size: f64,
    zone_threshold: f64,
}

impl Default for WeatherDataProcessor {
    fn default() -> Self {
        Self::new(&ProcessingConfig::default())
    }
}

impl WeatherDataProcessor {
    #[must_use]
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            grid_size: config.grid_size,
            zone_threshold: config.zone_threshold,
        }
    }

    /// Drop rows without valid coordinates and normalise the rest
    #[must_use]
    pub fn clean_observations(&self, records: Vec<ObservationRecord>) -> Vec<Observation> {
        let total = records.len();
        let cleaned: Vec<Observation> = records.into_iter().filter_map(clean_observation).collect();
        if cleaned.len() < total {
            debug!(
                "Dropped {} observation rows without valid coordinates",
                total - cleaned.len()
            );
        }
        cleaned
    }

    /// Same cleaning rules applied to forecast rows
    #[must_use]
    pub fn clean_forecast(&self, records: Vec<ForecastRecord>) -> Vec<ForecastPeriod> {
        records.into_iter().filter_map(clean_forecast_period).collect()
    }

    /// `(lat, lon, value)` triples for rows where `metric` is present
    #[must_use]
    pub fn create_heatmap_data(&self, observations: &[Observation], metric: Metric) -> Vec<HeatmapPoint> {
        heatmap::points(observations, metric)
    }

    /// Bin observations into `grid_size`-degree cells
    #[must_use]
    pub fn aggregate_by_grid(&self, observations: &[Observation], grid_size: f64) -> Vec<GridCell> {
        grid::aggregate(observations, grid_size)
    }

    /// Per-station temperature gradient against its nearest neighbours
    #[must_use]
    pub fn calculate_weather_gradients(&self, observations: &[Observation]) -> Vec<StationGradient> {
        gradients::calculate(observations)
    }

    /// Group stations into cold/moderate/warm bands around the mean temperature
    #[must_use]
    pub fn create_weather_zones(&self, observations: &[Observation], temp_threshold: f64) -> Vec<WeatherZone> {
        zones::create(observations, temp_threshold)
    }

    /// Clean both datasets and derive every aggregate
    #[must_use]
    pub fn prepare_for_mapping(
        &self,
        observations: Vec<ObservationRecord>,
        forecast: Vec<ForecastRecord>,
    ) -> ProcessedWeather {
        let observations = self.clean_observations(observations);
        let forecast = self.clean_forecast(forecast);

        if observations.is_empty() {
            return ProcessedWeather {
                forecast,
                ..ProcessedWeather::default()
            };
        }

        ProcessedWeather {
            grid: self.aggregate_by_grid(&observations, self.grid_size),
            zones: self.create_weather_zones(&observations, self.zone_threshold),
            gradients: self.calculate_weather_gradients(&observations),
            observations,
            forecast,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn valid_point(latitude: Option<f64>, longitude: Option<f64>) -> Option<(f64, f64)> {
    let (lat, lon) = (latitude?, longitude?);
    is_valid_coordinate(lat, lon).then_some((lat, lon))
}

fn clean_weather(weather: Option<String>) -> (Option<String>, String) {
    match weather.map(|w| normalize_description(&w)) {
        Some(description) => {
            let icon = weather_icon(&description).to_string();
            (Some(description), icon)
        }
        None => (None, DEFAULT_WEATHER_ICON.to_string()),
    }
}

fn clean_observation(record: ObservationRecord) -> Option<Observation> {
    let (latitude, longitude) = valid_point(record.latitude, record.longitude)?;
    let temperature = finite(record.temperature);
    let (weather, icon) = clean_weather(record.weather);

    Some(Observation {
        station_id: record.station_id,
        name: record.name,
        latitude,
        longitude,
        temperature,
        humidity: finite(record.humidity),
        pressure: finite(record.pressure),
        wind_speed: finite(record.wind_speed),
        wind_direction: record.wind_direction,
        weather,
        weather_icon: Some(icon),
        temp_category: temperature.and_then(TempCategory::from_fahrenheit),
        timestamp: record
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()),
    })
}

fn clean_forecast_period(record: ForecastRecord) -> Option<ForecastPeriod> {
    let (latitude, longitude) = valid_point(record.latitude, record.longitude)?;
    let (weather, icon) = clean_weather(record.weather);

    Some(ForecastPeriod {
        latitude,
        longitude,
        datetime: record
            .datetime
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()),
        temperature_max: finite(record.temperature_max),
        temperature_min: finite(record.temperature_min),
        humidity: finite(record.humidity),
        pressure: finite(record.pressure),
        wind_speed: finite(record.wind_speed),
        wind_direction: record.wind_direction,
        weather,
        weather_icon: Some(icon),
        precipitation_in: finite(record.precipitation_in),
        snow_in: finite(record.snow_in),
    })
}

/// Arithmetic mean of the present values
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Sample standard deviation (n - 1); `None` below two values
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values.iter().copied())?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::Observation;

    pub fn station(lat: f64, lon: f64, temp: Option<f64>) -> Observation {
        let obs = Observation::at(lat, lon);
        match temp {
            Some(t) => obs.with_temperature(t),
            None => obs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lat: Option<f64>, lon: Option<f64>, temp: Option<f64>) -> ObservationRecord {
        ObservationRecord {
            station_id: Some("KTEST".to_string()),
            latitude: lat,
            longitude: lon,
            temperature: temp,
            weather: Some("  Partly Cloudy ".to_string()),
            timestamp: Some("2024-03-05T07:51:00-05:00".to_string()),
            ..ObservationRecord::default()
        }
    }

    #[test]
    fn test_clean_drops_invalid_coordinates() {
        let processor = WeatherDataProcessor::default();
        let cleaned = processor.clean_observations(vec![
            record(Some(40.7), Some(-74.0), Some(55.0)),
            record(None, Some(-74.0), Some(55.0)),
            record(Some(95.0), Some(-74.0), Some(55.0)),
            record(Some(40.7), Some(-200.0), Some(55.0)),
        ]);

        assert_eq!(cleaned.len(), 1);
        let obs = &cleaned[0];
        assert_eq!(obs.weather.as_deref(), Some("partly cloudy"));
        assert_eq!(obs.weather_icon.as_deref(), Some("⛅"));
        assert_eq!(obs.temp_category, Some(TempCategory::Cool));
        assert!(obs.timestamp.is_some());
    }

    #[test]
    fn test_clean_missing_weather_gets_default_icon() {
        let processor = WeatherDataProcessor::default();
        let mut raw = record(Some(40.7), Some(-74.0), None);
        raw.weather = None;

        let cleaned = processor.clean_observations(vec![raw]);
        assert_eq!(cleaned[0].weather, None);
        assert_eq!(cleaned[0].weather_icon.as_deref(), Some(DEFAULT_WEATHER_ICON));
        assert_eq!(cleaned[0].temp_category, None);
    }

    #[test]
    fn test_clean_non_finite_temperature_is_missing() {
        let processor = WeatherDataProcessor::default();
        let cleaned = processor.clean_observations(vec![record(Some(40.7), Some(-74.0), Some(f64::NAN))]);
        assert_eq!(cleaned[0].temperature, None);
    }

    #[test]
    fn test_clean_forecast() {
        let processor = WeatherDataProcessor::default();
        let periods = processor.clean_forecast(vec![
            ForecastRecord {
                latitude: Some(40.7),
                longitude: Some(-74.0),
                datetime: Some("2024-03-06T07:00:00-05:00".to_string()),
                temperature_max: Some(61.0),
                temperature_min: Some(44.0),
                weather: Some("Rain".to_string()),
                ..ForecastRecord::default()
            },
            ForecastRecord::default(),
        ]);

        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].date_label(), "2024-03-06");
        assert_eq!(periods[0].weather_icon.as_deref(), Some("🌧️"));
    }

    #[test]
    fn test_prepare_for_mapping() {
        let processor = WeatherDataProcessor::default();
        let processed = processor.prepare_for_mapping(
            vec![
                record(Some(40.71), Some(-74.00), Some(50.0)),
                record(Some(40.75), Some(-73.98), Some(60.0)),
                record(Some(40.80), Some(-73.95), Some(70.0)),
            ],
            Vec::new(),
        );

        assert_eq!(processed.observations.len(), 3);
        assert_eq!(processed.grid.len(), 3);
        assert!(!processed.zones.is_empty());
        assert_eq!(processed.gradients.len(), 3);
        assert!(processed.forecast.is_empty());
    }

    #[test]
    fn test_prepare_for_mapping_empty() {
        let processor = WeatherDataProcessor::default();
        let processed = processor.prepare_for_mapping(Vec::new(), Vec::new());
        assert!(processed.is_empty());
        assert!(processed.grid.is_empty());
        assert!(processed.zones.is_empty());
    }

    #[test]
    fn test_stats_helpers() {
        assert_eq!(mean([1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(sample_std(&[5.0]), None);
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138).abs() < 1e-3);
    }
}
