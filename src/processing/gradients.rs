//! Nearest-neighbour temperature gradients

use super::mean;
use crate::models::Observation;
use crate::models::location::haversine_km;
use serde::{Deserialize, Serialize};

/// Number of neighbours each station is compared against
pub const NEIGHBOURS: usize = 3;

/// Temperature gradient at one station in °F per km
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationGradient {
    pub station_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: Option<f64>,
    /// `None` when the station or all of its neighbours lack a temperature
    pub temperature_gradient: Option<f64>,
}

pub(super) fn calculate(observations: &[Observation]) -> Vec<StationGradient> {
    if observations.len() < 2 {
        return Vec::new();
    }

    observations
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let mut neighbours: Vec<(f64, &Observation)> = observations
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| {
                    let distance = haversine_km(
                        (obs.latitude, obs.longitude),
                        (other.latitude, other.longitude),
                    );
                    (distance, other)
                })
                .collect();
            neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
            neighbours.truncate(NEIGHBOURS);

            let gradient = obs.temperature.and_then(|temp| {
                let neighbour_temp = mean(neighbours.iter().filter_map(|(_, n)| n.temperature))?;
                let distance = mean(neighbours.iter().map(|(d, _)| *d))?;
                Some(if distance > 0.0 {
                    (temp - neighbour_temp) / distance
                } else {
                    0.0
                })
            });

            StationGradient {
                station_id: obs.station_id.clone(),
                latitude: obs.latitude,
                longitude: obs.longitude,
                temperature: obs.temperature,
                temperature_gradient: gradient,
            }
        })
        .collect()
}
