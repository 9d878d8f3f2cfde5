//! Temperature zone banding

use super::{mean, sample_std};
use crate::models::Observation;
use serde::{Deserialize, Serialize};

/// Temperature band relative to the area mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    Cold,
    Moderate,
    Warm,
}

impl ZoneKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ZoneKind::Cold => "Cold Zone",
            ZoneKind::Moderate => "Moderate Zone",
            ZoneKind::Warm => "Warm Zone",
        }
    }

    /// Marker colour used on the map
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            ZoneKind::Cold => "blue",
            ZoneKind::Moderate => "green",
            ZoneKind::Warm => "red",
        }
    }
}

/// Summary of the stations falling into one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherZone {
    pub zone: ZoneKind,
    /// Centroid latitude of the member stations
    pub latitude: f64,
    /// Centroid longitude of the member stations
    pub longitude: f64,
    pub station_count: usize,
    pub temp_mean: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity_mean: Option<f64>,
    pub pressure_mean: Option<f64>,
}

fn classify(temp: f64, lower: f64, upper: f64) -> ZoneKind {
    if temp <= lower {
        ZoneKind::Cold
    } else if temp <= upper {
        ZoneKind::Moderate
    } else {
        ZoneKind::Warm
    }
}

pub(super) fn create(observations: &[Observation], temp_threshold: f64) -> Vec<WeatherZone> {
    let with_temp: Vec<(&Observation, f64)> = observations
        .iter()
        .filter_map(|o| o.temperature.map(|t| (o, t)))
        .collect();
    let temps: Vec<f64> = with_temp.iter().map(|(_, t)| *t).collect();

    let Some(center) = mean(temps.iter().copied()) else {
        return Vec::new();
    };
    let band = sample_std(&temps).map_or(temp_threshold, |std| std.max(temp_threshold));
    let (lower, upper) = (center - band, center + band);

    [ZoneKind::Cold, ZoneKind::Moderate, ZoneKind::Warm]
        .into_iter()
        .filter_map(|kind| {
            let members: Vec<(&Observation, f64)> = with_temp
                .iter()
                .copied()
                .filter(|(_, t)| classify(*t, lower, upper) == kind)
                .collect();
            if members.is_empty() {
                return None;
            }

            Some(WeatherZone {
                zone: kind,
                latitude: mean(members.iter().map(|(o, _)| o.latitude))?,
                longitude: mean(members.iter().map(|(o, _)| o.longitude))?,
                station_count: members.len(),
                temp_mean: mean(members.iter().map(|(_, t)| *t))?,
                temp_min: members.iter().map(|(_, t)| *t).reduce(f64::min)?,
                temp_max: members.iter().map(|(_, t)| *t).reduce(f64::max)?,
                humidity_mean: mean(members.iter().filter_map(|(o, _)| o.humidity)),
                pressure_mean: mean(members.iter().filter_map(|(o, _)| o.pressure)),
            })
        })
        .collect()
}
