//! Hyperlocal Weather Map - interactive maps of nearby weather stations
//!
//! This library fetches current observations and forecasts from the Xweather
//! API, cleans and aggregates them, and renders a self-contained Leaflet map
//! with station markers, a heatmap, temperature zones and weather overlays.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod geocode;
pub mod logging;
pub mod map;
pub mod models;
pub mod optimization;
pub mod processing;

// Re-export core types for public API
pub use api::XweatherClient;
pub use app::HyperlocalWeatherApp;
pub use cache::PersistentCache;
pub use config::WeatherMapConfig;
pub use error::{ErrorCode, WeatherMapError};
pub use geocode::{Geocoder, LocationInput, LocationParser};
pub use map::{MapDocument, MapOptions, WeatherMap};
pub use models::{ForecastPeriod, ForecastRecord, Location, Metric, Observation, ObservationRecord};
pub use optimization::{MapPerformanceOptimizer, PerformanceOptimizer};
pub use processing::{ProcessedWeather, WeatherDataProcessor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherMapError>;
