//! Grid binning of observations

use super::mean;
use crate::models::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated readings for one grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// South-west corner latitude, `floor(lat / size) * size`
    pub grid_lat: f64,
    /// South-west corner longitude, `floor(lon / size) * size`
    pub grid_lon: f64,
    pub temp_mean: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    /// Stations in the cell reporting a temperature
    pub station_count: usize,
    pub humidity_mean: Option<f64>,
    pub pressure_mean: Option<f64>,
    pub wind_speed_mean: Option<f64>,
}

pub(super) fn aggregate(observations: &[Observation], grid_size: f64) -> Vec<GridCell> {
    if observations.is_empty() || !(grid_size.is_finite() && grid_size > 0.0) {
        return Vec::new();
    }

    // Integer cell indices keep grouping exact; BTreeMap yields (lat, lon) order.
    let mut cells: BTreeMap<(i64, i64), Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        let key = (
            (obs.latitude / grid_size).floor() as i64,
            (obs.longitude / grid_size).floor() as i64,
        );
        cells.entry(key).or_default().push(obs);
    }

    cells
        .into_iter()
        .map(|((lat_idx, lon_idx), members)| {
            let temps: Vec<f64> = members.iter().filter_map(|o| o.temperature).collect();
            GridCell {
                grid_lat: lat_idx as f64 * grid_size,
                grid_lon: lon_idx as f64 * grid_size,
                temp_mean: mean(temps.iter().copied()),
                temp_min: temps.iter().copied().reduce(f64::min),
                temp_max: temps.iter().copied().reduce(f64::max),
                station_count: temps.len(),
                humidity_mean: mean(members.iter().filter_map(|o| o.humidity)),
                pressure_mean: mean(members.iter().filter_map(|o| o.pressure)),
                wind_speed_mean: mean(members.iter().filter_map(|o| o.wind_speed)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_support::station;

    #[test]
    fn test_stations_in_same_cell_are_merged() {
        let mut a = station(40.7125, -74.0055, Some(50.0));
        a.humidity = Some(60.0);
        let mut b = station(40.7175, -74.0015, Some(54.0));
        b.humidity = Some(70.0);
        let c = station(40.7255, -74.0055, Some(40.0));

        let cells = aggregate(&[a, b, c], 0.01);
        assert_eq!(cells.len(), 2);

        let first = &cells[0];
        assert!((first.grid_lat - 40.71).abs() < 1e-9);
        assert!((first.grid_lon - -74.01).abs() < 1e-9);
        assert_eq!(first.station_count, 2);
        assert_eq!(first.temp_mean, Some(52.0));
        assert_eq!(first.temp_min, Some(50.0));
        assert_eq!(first.temp_max, Some(54.0));
        assert_eq!(first.humidity_mean, Some(65.0));
        assert_eq!(first.pressure_mean, None);

        assert!((cells[1].grid_lat - 40.72).abs() < 1e-9);
    }

    #[test]
    fn test_cells_are_sorted() {
        let cells = aggregate(
            &[
                station(41.005, -73.005, Some(1.0)),
                station(40.005, -72.005, Some(2.0)),
                station(40.005, -74.005, Some(3.0)),
            ],
            0.01,
        );
        let keys: Vec<(f64, f64)> = cells.iter().map(|c| (c.grid_lat, c.grid_lon)).collect();
        let mut sorted = keys.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_cell_without_temperatures() {
        let cells = aggregate(&[station(40.7125, -74.0055, None)], 0.01);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].station_count, 0);
        assert_eq!(cells[0].temp_mean, None);
    }

    #[test]
    fn test_empty_and_invalid_grid() {
        assert!(aggregate(&[], 0.01).is_empty());
        assert!(aggregate(&[station(40.0, -74.0, Some(1.0))], 0.0).is_empty());
    }
}
