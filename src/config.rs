//! Configuration management for the weather map application
//!
//! Handles loading configuration from a TOML file and environment variables,
//! applies the `XWEATHER_*` credential overrides and validates the result.

use crate::WeatherMapError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application directory name used below the platform config/cache dirs
pub const APP_DIR: &str = "hyperlocal-weather-map";

/// Prefix of environment variables mapped onto configuration keys
pub const ENV_PREFIX: &str = "WEATHERMAP";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherMapConfig {
    /// Xweather data and tile API settings
    #[serde(default)]
    pub xweather: XweatherConfig,
    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Map rendering defaults
    #[serde(default)]
    pub map: MapConfig,
    /// Data processing parameters
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Place-name geocoding
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// Xweather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XweatherConfig {
    /// Client ID (`XWEATHER_CLIENT_ID`)
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret (`XWEATHER_CLIENT_SECRET`)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Base URL for the data API (`XWEATHER_BASE_URL`)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base URL for raster map tiles
    #[serde(default = "default_maps_base_url")]
    pub maps_base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial retry backoff in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Client-side request budget per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Maximum stations requested per observation query
    #[serde(default = "default_observation_limit")]
    pub observation_limit: u32,
    /// Number of forecast periods requested
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether API responses are cached on disk
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of in-memory processed results
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
    /// Cache directory; platform cache dir when unset
    #[serde(default)]
    pub location: Option<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Map rendering defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial zoom level
    #[serde(default = "default_zoom")]
    pub default_zoom: u8,
    /// Map centre as `[lat, lon]`
    #[serde(default = "default_center")]
    pub default_center: [f64; 2],
    /// Search radius in kilometers
    #[serde(default = "default_radius")]
    pub default_radius_km: u32,
    /// Base tile layer name
    #[serde(default = "default_tile_layer")]
    pub tile_layer: String,
    /// Xweather overlay layers
    #[serde(default = "default_overlays")]
    pub overlays: Vec<String>,
    /// Upper bound on heatmap points before thinning
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    /// Probe the tile host and fall back to OpenStreetMap when unreachable
    #[serde(default)]
    pub verify_tiles: bool,
}

/// Data processing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Grid cell size in degrees
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    /// Minimum half-width of the moderate temperature band in °F
    #[serde(default = "default_zone_threshold")]
    pub zone_threshold: f64,
    /// Stations per grid cell above which markers are clustered
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: usize,
}

/// Geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Nominatim search endpoint
    #[serde(default = "default_geocoding_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_seconds: u32,
}

// Default value functions
fn default_base_url() -> String {
    "https://data.api.xweather.com".to_string()
}

fn default_maps_base_url() -> String {
    "https://maps.api.xweather.com".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_observation_limit() -> u32 {
    100
}

fn default_forecast_days() -> u32 {
    5
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_max_entries() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_zoom() -> u8 {
    10
}

fn default_center() -> [f64; 2] {
    [40.7128, -74.0060]
}

fn default_radius() -> u32 {
    50
}

fn default_tile_layer() -> String {
    "satellite".to_string()
}

fn default_overlays() -> Vec<String> {
    vec![
        "radar".to_string(),
        "temperatures".to_string(),
        "wind".to_string(),
    ]
}

fn default_max_points() -> usize {
    1000
}

fn default_grid_size() -> f64 {
    0.01
}

fn default_zone_threshold() -> f64 {
    5.0
}

fn default_cluster_threshold() -> usize {
    50
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_geocoding_timeout() -> u32 {
    15
}

impl Default for XweatherConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: default_base_url(),
            maps_base_url: default_maps_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            requests_per_minute: default_requests_per_minute(),
            observation_limit: default_observation_limit(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_seconds: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            location: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_zoom: default_zoom(),
            default_center: default_center(),
            default_radius_km: default_radius(),
            tile_layer: default_tile_layer(),
            overlays: default_overlays(),
            max_points: default_max_points(),
            verify_tiles: false,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            zone_threshold: default_zone_threshold(),
            cluster_threshold: default_cluster_threshold(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_url(),
            timeout_seconds: default_geocoding_timeout(),
        }
    }
}

impl XweatherConfig {
    /// Both credentials, if present and non-blank
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.client_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let secret = self
            .client_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some((id, secret))
    }
}

impl CacheConfig {
    /// Resolve the cache directory, expanding a leading `~`
    #[must_use]
    pub fn resolved_location(&self) -> Option<PathBuf> {
        match self.location.as_deref() {
            Some(path) if path.starts_with("~/") => {
                dirs::home_dir().map(|home| home.join(&path[2..]))
            }
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => dirs::cache_dir().map(|dir| dir.join(APP_DIR)),
        }
    }
}

impl WeatherMapConfig {
    /// Load configuration from the default file location and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from the specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(Self::environment());

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: WeatherMapConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// `WEATHERMAP_<SECTION>__<KEY>` variables, e.g. `WEATHERMAP_MAP__DEFAULT_ZOOM=12`
    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Apply the `XWEATHER_*` variables documented for the tool
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("XWEATHER_CLIENT_ID") {
            self.xweather.client_id = Some(id);
        }
        if let Some(secret) = lookup("XWEATHER_CLIENT_SECRET") {
            self.xweather.client_secret = Some(secret);
        }
        if let Some(url) = lookup("XWEATHER_BASE_URL").filter(|u| !u.is_empty()) {
            self.xweather.base_url = url;
        }
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.xweather.timeout_seconds == 0 || self.xweather.timeout_seconds > 300 {
            return Err(
                WeatherMapError::config("Xweather timeout must be between 1 and 300 seconds")
                    .into(),
            );
        }

        if self.xweather.max_retries > 10 {
            return Err(WeatherMapError::config("Xweather max retries cannot exceed 10").into());
        }

        if self.xweather.requests_per_minute == 0 {
            return Err(
                WeatherMapError::config("Requests per minute must be greater than zero").into(),
            );
        }

        if !(1..=15).contains(&self.xweather.forecast_days) {
            return Err(
                WeatherMapError::config("Forecast days must be between 1 and 15").into(),
            );
        }

        if !(1..=500).contains(&self.map.default_radius_km) {
            return Err(
                WeatherMapError::config("Search radius must be between 1 and 500 km").into(),
            );
        }

        if self.map.default_zoom > 20 {
            return Err(WeatherMapError::config("Zoom level cannot exceed 20").into());
        }

        if !(self.processing.grid_size > 0.0 && self.processing.grid_size.is_finite()) {
            return Err(WeatherMapError::config("Grid size must be a positive number").into());
        }

        if self.processing.zone_threshold < 0.0 || !self.processing.zone_threshold.is_finite() {
            return Err(WeatherMapError::config("Zone threshold cannot be negative").into());
        }

        let [lat, lon] = self.map.default_center;
        crate::models::location::validate_coordinates(lat, lon)
            .with_context(|| "Invalid default map center")?;

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherMapError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherMapError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Xweather base URL", &self.xweather.base_url),
            ("Xweather maps URL", &self.xweather.maps_base_url),
            ("Geocoding URL", &self.geocoding.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WeatherMapError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
