//! Performance helpers for requests and map rendering
//!
//! [`PerformanceOptimizer`] deduplicates, batches and fans out request
//! parameters, rate limits callers and memoises processed results in memory.
//! [`MapPerformanceOptimizer`] keeps large datasets renderable: marker
//! clustering, heatmap thinning and Web-Mercator tile coverage.

use crate::Result;
use crate::api::RateLimiter;
use crate::models::Observation;
use crate::processing::{HeatmapPoint, ProcessedWeather};
use futures::stream::{self, StreamExt};
use moka::sync::Cache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tracing::{error, info, warn};

/// Grid used for marker clustering, in degrees
pub const CLUSTER_GRID_SIZE: f64 = 0.01;

/// Latitude limit of the Web-Mercator projection
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Request and result-level optimisations
pub struct PerformanceOptimizer {
    cache: Cache<String, ProcessedWeather>,
    rate_limiter: Mutex<RateLimiter>,
}

impl std::fmt::Debug for PerformanceOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceOptimizer")
            .field("cached_entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl Default for PerformanceOptimizer {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(300), 60)
    }
}

impl PerformanceOptimizer {
    #[must_use]
    pub fn new(cache_size: u64, cache_ttl: Duration, max_requests_per_minute: u32) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(cache_size)
                .time_to_live(cache_ttl)
                .build(),
            rate_limiter: Mutex::new(RateLimiter::new(max_requests_per_minute)),
        }
    }

    /// Remove duplicate requests, keeping first occurrences in order
    pub fn optimize_api_requests<T: Hash + Eq + Clone>(&self, requests: &[T]) -> Vec<T> {
        let mut seen = HashSet::new();
        let unique: Vec<T> = requests
            .iter()
            .filter(|req| seen.insert(*req))
            .cloned()
            .collect();
        info!(
            "Optimized {} requests to {} unique requests",
            requests.len(),
            unique.len()
        );
        unique
    }

    /// Split requests into consecutive batches of at most `batch_size`
    pub fn batch_requests<T: Clone>(&self, requests: &[T], batch_size: usize) -> Vec<Vec<T>> {
        requests
            .chunks(batch_size.max(1))
            .map(<[T]>::to_vec)
            .collect()
    }

    /// Run `call` for every request with at most `max_workers` in flight.
    ///
    /// Results keep the order of `requests`; failed calls are logged and yield `None`.
    pub async fn parallel_api_calls<T, R, F, Fut>(
        &self,
        requests: Vec<T>,
        call: F,
        max_workers: usize,
    ) -> Vec<Option<R>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        stream::iter(requests)
            .map(call)
            .buffered(max_workers.max(1))
            .map(|outcome| match outcome {
                Ok(value) => Some(value),
                Err(e) => {
                    error!("API call failed: {}", e);
                    None
                }
            })
            .collect()
            .await
    }

    /// Record a request if the per-minute budget allows it
    pub fn allow_request(&self) -> bool {
        let allowed = self.rate_limiter.lock().allow_request();
        if !allowed {
            warn!("Rate limit exceeded, waiting...");
        }
        allowed
    }

    pub fn cache_weather_data(&self, cache_key: &str, data: ProcessedWeather) {
        self.cache.insert(cache_key.to_string(), data);
        info!("Cached data with key: {}", cache_key);
    }

    #[must_use]
    pub fn get_cached_data(&self, cache_key: &str) -> Option<ProcessedWeather> {
        self.cache.get(cache_key)
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
        info!("Cache cleared");
    }
}

/// A marker slot after clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusteredMarker {
    Station(Observation),
    Cluster {
        latitude: f64,
        longitude: f64,
        count: usize,
        avg_temp: Option<f64>,
    },
}

/// Web-Mercator tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    /// Tile containing a point at the given zoom
    #[must_use]
    pub fn containing(latitude: f64, longitude: f64, zoom: u8) -> Self {
        let n = f64::from(1u32 << zoom.min(31));
        let max_index = n - 1.0;
        let lat = latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
        let x = ((longitude + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * n)
            .floor()
            .clamp(0.0, max_index);
        Self {
            zoom,
            x: x as u32,
            y: y as u32,
        }
    }
}

/// Map-side optimisations for large station sets
#[derive(Debug, Default)]
pub struct MapPerformanceOptimizer {
    tile_cache: Mutex<HashSet<TileKey>>,
}

impl MapPerformanceOptimizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapse dense grid cells into cluster markers.
    ///
    /// With at most `cluster_threshold` stations overall every station is kept.
    /// Otherwise stations are binned on a 0.01° grid and each cell holding more
    /// than `cluster_threshold` stations becomes one cluster.
    pub fn optimize_marker_clustering(
        &self,
        observations: &[Observation],
        cluster_threshold: usize,
    ) -> Vec<ClusteredMarker> {
        if observations.len() <= cluster_threshold {
            return observations
                .iter()
                .cloned()
                .map(ClusteredMarker::Station)
                .collect();
        }

        let mut cells: BTreeMap<(i64, i64), Vec<&Observation>> = BTreeMap::new();
        for obs in observations {
            let key = (
                (obs.latitude / CLUSTER_GRID_SIZE).floor() as i64,
                (obs.longitude / CLUSTER_GRID_SIZE).floor() as i64,
            );
            cells.entry(key).or_default().push(obs);
        }

        let mut markers = Vec::new();
        for ((lat_idx, lon_idx), members) in cells {
            if members.len() > cluster_threshold {
                markers.push(ClusteredMarker::Cluster {
                    latitude: lat_idx as f64 * CLUSTER_GRID_SIZE,
                    longitude: lon_idx as f64 * CLUSTER_GRID_SIZE,
                    count: members.len(),
                    avg_temp: crate::processing::mean(members.iter().filter_map(|o| o.temperature)),
                });
            } else {
                markers.extend(members.into_iter().cloned().map(ClusteredMarker::Station));
            }
        }
        markers
    }

    /// Thin a heatmap to `max_points` with an even stride over the input
    pub fn optimize_heatmap_data(&self, points: &[HeatmapPoint], max_points: usize) -> Vec<HeatmapPoint> {
        thin_points(points, max_points)
    }

    /// Record every tile covering `bounds` at each zoom level.
    ///
    /// `bounds` is `(min_lat, min_lon, max_lat, max_lon)`. Returns the number of
    /// tiles that were not already recorded.
    pub fn preload_map_tiles(&self, bounds: (f64, f64, f64, f64), zoom_levels: &[u8]) -> usize {
        let (min_lat, min_lon, max_lat, max_lon) = bounds;
        let mut cache = self.tile_cache.lock();
        let before = cache.len();

        for &zoom in zoom_levels {
            let top_left = TileKey::containing(max_lat, min_lon, zoom);
            let bottom_right = TileKey::containing(min_lat, max_lon, zoom);
            for x in top_left.x..=bottom_right.x {
                for y in top_left.y..=bottom_right.y {
                    cache.insert(TileKey { zoom, x, y });
                }
            }
        }

        info!("Preloaded tiles for zoom levels: {:?}", zoom_levels);
        cache.len() - before
    }

    #[must_use]
    pub fn is_tile_loaded(&self, tile: &TileKey) -> bool {
        self.tile_cache.lock().contains(tile)
    }

    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tile_cache.lock().len()
    }
}

/// Evenly strided subset of at most `max_points` points
#[must_use]
pub fn thin_points(points: &[HeatmapPoint], max_points: usize) -> Vec<HeatmapPoint> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    (0..max_points)
        .map(|i| points[i * points.len() / max_points])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_support::station;

    #[test]
    fn test_optimize_api_requests_dedups_in_order() {
        let optimizer = PerformanceOptimizer::default();
        let requests = vec![("nyc", 30), ("la", 30), ("nyc", 30), ("chi", 30), ("la", 30)];
        assert_eq!(
            optimizer.optimize_api_requests(&requests),
            vec![("nyc", 30), ("la", 30), ("chi", 30)]
        );
    }

    #[test]
    fn test_batch_requests() {
        let optimizer = PerformanceOptimizer::default();
        let batches = optimizer.batch_requests(&[1, 2, 3, 4, 5], 2);
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert_eq!(optimizer.batch_requests(&[1, 2], 0), vec![vec![1], vec![2]]);
        assert!(optimizer.batch_requests::<i32>(&[], 10).is_empty());
    }

    #[tokio::test]
    async fn test_parallel_api_calls_maps_failures_to_none() {
        let optimizer = PerformanceOptimizer::default();
        let results = optimizer
            .parallel_api_calls(
                vec![1, 2, 3, 4],
                |n| async move {
                    if n % 2 == 0 {
                        Err(crate::WeatherMapError::general("even"))
                    } else {
                        Ok(n * 10)
                    }
                },
                2,
            )
            .await;
        assert_eq!(results, vec![Some(10), None, Some(30), None]);
    }

    #[test]
    fn test_allow_request() {
        let optimizer = PerformanceOptimizer::new(10, Duration::from_secs(60), 2);
        assert!(optimizer.allow_request());
        assert!(optimizer.allow_request());
        assert!(!optimizer.allow_request());
    }

    #[test]
    fn test_result_cache() {
        let optimizer = PerformanceOptimizer::default();
        assert!(optimizer.get_cached_data("nyc").is_none());

        let data = ProcessedWeather {
            observations: vec![station(40.7, -74.0, Some(50.0))],
            ..ProcessedWeather::default()
        };
        optimizer.cache_weather_data("nyc", data.clone());
        assert_eq!(
            optimizer.get_cached_data("nyc").map(|d| d.observations),
            Some(data.observations)
        );

        optimizer.clear_cache();
        assert!(optimizer.get_cached_data("nyc").is_none());
    }

    #[test]
    fn test_clustering_below_threshold_keeps_stations() {
        let optimizer = MapPerformanceOptimizer::new();
        let markers = optimizer.optimize_marker_clustering(
            &[station(40.0, -74.0, Some(50.0)), station(40.1, -74.1, Some(52.0))],
            5,
        );
        assert_eq!(markers.len(), 2);
        assert!(markers.iter().all(|m| matches!(m, ClusteredMarker::Station(_))));
    }

    #[test]
    fn test_clustering_collapses_dense_cells() {
        let optimizer = MapPerformanceOptimizer::new();
        let mut observations: Vec<Observation> = (0..4)
            .map(|i| station(40.7125 + f64::from(i) * 0.001, -74.0055, Some(50.0 + f64::from(i) * 2.0)))
            .collect();
        observations.push(station(41.5055, -73.5055, Some(40.0)));

        let markers = optimizer.optimize_marker_clustering(&observations, 3);
        assert_eq!(markers.len(), 2);
        match &markers[0] {
            ClusteredMarker::Cluster { count, avg_temp, .. } => {
                assert_eq!(*count, 4);
                assert_eq!(*avg_temp, Some(53.0));
            }
            other => panic!("expected cluster, got {other:?}"),
        }
        assert!(matches!(markers[1], ClusteredMarker::Station(_)));
    }

    #[test]
    fn test_heatmap_thinning_is_even() {
        let points: Vec<HeatmapPoint> = (0..10)
            .map(|i| HeatmapPoint::new(f64::from(i), 0.0, f64::from(i)))
            .collect();

        let thinned = thin_points(&points, 5);
        let values: Vec<f64> = thinned.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![0.0, 2.0, 4.0, 6.0, 8.0]);

        assert_eq!(thin_points(&points, 20).len(), 10);
        assert!(thin_points(&points, 0).is_empty());
    }

    #[test]
    fn test_tile_key_containing() {
        assert_eq!(TileKey::containing(0.0, 0.0, 1), TileKey { zoom: 1, x: 1, y: 1 });
        assert_eq!(TileKey::containing(85.0, -180.0, 2), TileKey { zoom: 2, x: 0, y: 0 });
        // New York at zoom 10
        assert_eq!(
            TileKey::containing(40.7128, -74.0060, 10),
            TileKey { zoom: 10, x: 301, y: 385 }
        );
    }

    #[test]
    fn test_preload_map_tiles() {
        let optimizer = MapPerformanceOptimizer::new();
        let bounds = (40.5, -74.3, 40.9, -73.7);

        let added = optimizer.preload_map_tiles(bounds, &[8, 9]);
        assert!(added >= 2);
        assert_eq!(optimizer.tile_count(), added);
        assert!(optimizer.is_tile_loaded(&TileKey::containing(40.7128, -74.0060, 9)));

        // second pass over the same bounds adds nothing
        assert_eq!(optimizer.preload_map_tiles(bounds, &[8, 9]), 0);
    }
}
