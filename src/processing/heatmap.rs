//! Heatmap point extraction

use crate::models::{Metric, Observation};
use serde::{Deserialize, Serialize};

/// A `(latitude, longitude, value)` heatmap sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

impl HeatmapPoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, value: f64) -> Self {
        Self {
            latitude,
            longitude,
            value,
        }
    }
}

/// Heatmap samples for observations where `metric` is present
pub fn points(observations: &[Observation], metric: Metric) -> Vec<HeatmapPoint> {
    observations
        .iter()
        .filter_map(|obs| {
            metric
                .value(obs)
                .map(|value| HeatmapPoint::new(obs.latitude, obs.longitude, value))
        })
        .collect()
}

/// Scale values into `[0, 1]`; a constant series maps to 1.0
#[must_use]
pub fn normalize(points: &[HeatmapPoint]) -> Vec<[f64; 3]> {
    let min = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    points
        .iter()
        .map(|p| {
            let intensity = if span > 0.0 { (p.value - min) / span } else { 1.0 };
            [p.latitude, p.longitude, intensity]
        })
        .collect()
}
