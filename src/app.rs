//! Application orchestration: fetch, process, render, save

use crate::api::XweatherClient;
use crate::cache::PersistentCache;
use crate::config::WeatherMapConfig;
use crate::geocode::{Geocoder, LocationParser};
use crate::map::{MapOptions, WeatherMap};
use crate::models::Location;
use crate::models::location::validate_coordinates;
use crate::optimization::{PerformanceOptimizer, TileKey};
use crate::processing::{ProcessedWeather, WeatherDataProcessor};
use crate::{Result, WeatherMapError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Search radius used by the demo tour, in kilometers
pub const DEMO_RADIUS_KM: u32 = 30;

/// Cities visited by the demo tour
#[must_use]
pub fn demo_locations() -> Vec<Location> {
    vec![
        Location::new(40.7128, -74.0060, "New York City".to_string()),
        Location::new(34.0522, -118.2437, "Los Angeles".to_string()),
        Location::new(41.8781, -87.6298, "Chicago".to_string()),
    ]
}

/// Headline numbers for a processed dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub stations: usize,
    pub temperature_range: Option<(f64, f64)>,
    pub humidity_range: Option<(f64, f64)>,
    pub forecast_periods: usize,
}

impl DataSummary {
    #[must_use]
    pub fn of(data: &ProcessedWeather) -> Self {
        fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
            values.fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
        }

        Self {
            stations: data.observations.len(),
            temperature_range: range(data.observations.iter().filter_map(|o| o.temperature)),
            humidity_range: range(data.observations.iter().filter_map(|o| o.humidity)),
            forecast_periods: data.forecast.len(),
        }
    }
}

/// Result of one city in the demo tour
#[derive(Debug)]
pub struct DemoOutcome {
    pub location: Location,
    pub result: std::result::Result<(PathBuf, DataSummary), String>,
}

/// Main application
pub struct HyperlocalWeatherApp {
    config: WeatherMapConfig,
    client: XweatherClient,
    processor: WeatherDataProcessor,
    geocoder: Geocoder,
    optimizer: PerformanceOptimizer,
}

impl std::fmt::Debug for HyperlocalWeatherApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperlocalWeatherApp")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl HyperlocalWeatherApp {
    /// Build the application. Fails when Xweather credentials are missing.
    pub fn new(config: WeatherMapConfig) -> Result<Self> {
        let mut client = XweatherClient::new(&config)?;

        if config.cache.enabled {
            match config.cache.resolved_location() {
                Some(path) => match PersistentCache::open(&path) {
                    Ok(cache) => {
                        debug!("Response cache at {}", path.display());
                        client = client.with_cache(cache);
                    }
                    Err(e) => warn!("Response cache unavailable, continuing without it: {}", e),
                },
                None => warn!("No cache directory available, continuing without response cache"),
            }
        }

        let optimizer = PerformanceOptimizer::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.ttl_seconds),
            config.xweather.requests_per_minute,
        );

        let app = Self {
            processor: WeatherDataProcessor::new(&config.processing),
            geocoder: Geocoder::new(&config.geocoding)?,
            client,
            optimizer,
            config,
        };
        info!("Hyperlocal Weather App initialized");
        Ok(app)
    }

    #[must_use]
    pub fn config(&self) -> &WeatherMapConfig {
        &self.config
    }

    /// Map options seeded from the configuration
    #[must_use]
    pub fn default_map_options(&self) -> MapOptions {
        MapOptions {
            tile_layer: self.config.map.tile_layer.clone(),
            overlays: self.config.map.overlays.clone(),
            max_heatmap_points: Some(self.config.map.max_points),
            cluster_threshold: Some(self.config.processing.cluster_threshold),
            ..MapOptions::default()
        }
    }

    /// Turn free-form input (`"lat,lon"` or a place name) into a location
    pub async fn resolve_location(&self, input: &str) -> Result<Location> {
        let parsed = LocationParser::parse(input)?;
        self.geocoder.resolve(parsed).await
    }

    /// Fetch and process weather data around a point
    #[instrument(skip(self))]
    pub async fn get_weather_data(
        &self,
        center_lat: f64,
        center_lon: f64,
        radius_km: u32,
        include_forecast: bool,
    ) -> Result<ProcessedWeather> {
        validate_coordinates(center_lat, center_lon)?;
        if radius_km == 0 {
            return Err(WeatherMapError::validation("Radius must be at least 1 km"));
        }

        let cache_key = format!("{center_lat:.4},{center_lon:.4}:{radius_km}:{include_forecast}");
        if let Some(cached) = self.optimizer.get_cached_data(&cache_key) {
            debug!("Using processed data from memory");
            return Ok(cached);
        }

        info!("Fetching weather data for {}, {}", center_lat, center_lon);
        let start = Instant::now();

        let (observations, forecast) = self
            .client
            .get_hyperlocal_data(center_lat, center_lon, radius_km, include_forecast)
            .await
            .inspect_err(|e| error!("Error fetching weather data: {}", e))?;

        info!("Retrieved {} observations", observations.len());
        if !forecast.is_empty() {
            info!("Retrieved {} forecast periods", forecast.len());
        }

        let processed = self.processor.prepare_for_mapping(observations, forecast);
        info!(
            "get_weather_data took {:.2} seconds",
            start.elapsed().as_secs_f64()
        );

        self.optimizer.cache_weather_data(&cache_key, processed.clone());
        Ok(processed)
    }

    /// Render processed data to an HTML map and write it to `output`
    #[instrument(skip(self, data, options))]
    pub async fn create_weather_map(
        &self,
        data: &ProcessedWeather,
        output: &Path,
        options: &MapOptions,
        auto_open: bool,
    ) -> Result<PathBuf> {
        info!("Creating weather map");
        let start = Instant::now();

        let center = self.data_center(data);
        let map_builder = WeatherMap::from_config(&self.config, Some(center));

        let mut options = options.clone();
        options.tile_layer = self.verified_tile_layer(&map_builder, &options.tile_layer).await;

        let doc = map_builder.create_comprehensive_map(data, &options);
        let path = map_builder
            .save_map(&doc, output, auto_open)
            .inspect_err(|e| error!("Error creating weather map: {}", e))?;

        info!(
            "Weather map saved to {} in {:.2} seconds",
            path.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(path)
    }

    /// Build a map for each city, writing `demo_<slug>_weather.html` into `out_dir`.
    ///
    /// Data for all cities is fetched concurrently; a failing city is logged and
    /// the others still get their maps.
    pub async fn run_demo(
        &self,
        locations: &[Location],
        radius_km: u32,
        out_dir: &Path,
        auto_open: bool,
    ) -> Vec<DemoOutcome> {
        info!("Running demo for {} locations", locations.len());

        let fetched = self
            .optimizer
            .parallel_api_calls(
                locations.to_vec(),
                |location| async move {
                    let fetched = self
                        .get_weather_data(location.latitude, location.longitude, radius_km, true)
                        .await
                        .map_err(|e| {
                            error!("Error fetching data for {}: {}", location.name, e);
                            e.user_message()
                        });
                    Ok::<_, WeatherMapError>(fetched)
                },
                3,
            )
            .await;

        let options = self.default_map_options();
        let mut outcomes = Vec::with_capacity(locations.len());

        for (location, data) in locations.iter().zip(fetched) {
            let result = match data {
                None => Err(format!("Failed to fetch weather data for {}", location.name)),
                Some(Err(reason)) => Err(reason),
                Some(Ok(data)) => {
                    let output = out_dir.join(format!("demo_{}_weather.html", location.slug()));
                    match self.create_weather_map(&data, &output, &options, auto_open).await {
                        Ok(path) => Ok((path, DataSummary::of(&data))),
                        Err(e) => {
                            error!("Error processing {}: {}", location.name, e);
                            Err(e.user_message())
                        }
                    }
                }
            };
            outcomes.push(DemoOutcome {
                location: location.clone(),
                result,
            });
        }

        outcomes
    }

    /// Centroid of the stations, else the forecast point, else the configured centre
    fn data_center(&self, data: &ProcessedWeather) -> (f64, f64) {
        let stations = &data.observations;
        if !stations.is_empty() {
            let n = stations.len() as f64;
            let lat = stations.iter().map(|o| o.latitude).sum::<f64>() / n;
            let lon = stations.iter().map(|o| o.longitude).sum::<f64>() / n;
            return (lat, lon);
        }
        if let Some(period) = data.forecast.first() {
            return (period.latitude, period.longitude);
        }
        let [lat, lon] = self.config.map.default_center;
        (lat, lon)
    }

    /// Keep `requested` when its tiles are reachable (or not checked), else OpenStreetMap
    async fn verified_tile_layer(&self, map_builder: &WeatherMap, requested: &str) -> String {
        if !self.config.map.verify_tiles {
            return requested.to_string();
        }
        let Some(template) = map_builder.base_tile_url(requested) else {
            return requested.to_string();
        };

        let (lat, lon) = map_builder.center();
        let tile = TileKey::containing(lat, lon, map_builder.zoom());
        let url = template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string());

        if self.client.probe_tile(&url).await {
            requested.to_string()
        } else {
            warn!("Xweather tiles unreachable, falling back to OpenStreetMap");
            "openstreetmap".to_string()
        }
    }
}
