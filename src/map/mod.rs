//! Interactive weather map construction
//!
//! [`WeatherMap`] assembles a [`MapDocument`] from processed weather data:
//! Xweather base tiles, station markers, a heatmap, zone markers, forecast pins
//! and weather tile overlays. [`render`] turns the document into HTML.

pub mod layers;
pub mod render;

pub use layers::{Layer, MapDocument};
pub use render::{MapRenderer, save_map};

use crate::config::WeatherMapConfig;
use crate::models::{ForecastPeriod, Metric, Observation};
use crate::optimization::{ClusteredMarker, MapPerformanceOptimizer};
use crate::processing::{HeatmapPoint, ProcessedWeather, WeatherZone, heatmap};
use layers::{CircleMarker, Controls, HeatmapOptions, IconMarker, Legend, Marker, MousePosition, TileLayer};
use std::path::{Path, PathBuf};
use tera::escape_html;
use tracing::{debug, warn};

/// Base layers served by the Xweather tile host
pub const BASE_LAYERS: [&str; 3] = ["terrain", "satellite", "street"];

/// Weather overlays served by the Xweather tile host
pub const OVERLAY_LAYERS: [&str; 3] = ["radar", "temperatures", "wind"];

pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OSM_ATTRIBUTION: &str = "OpenStreetMap contributors";
const XWEATHER_ATTRIBUTION: &str = "Xweather";

pub const OBSERVATIONS_LAYER: &str = "Weather Observations";
pub const HEATMAP_LAYER: &str = "Temperature Heatmap";
pub const ZONES_LAYER: &str = "Weather Zones";
pub const FORECAST_LAYER: &str = "Weather Forecast";

/// Xweather tile endpoint with credentials embedded in the path
#[derive(Debug, Clone)]
pub struct TileSource {
    pub maps_base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl TileSource {
    /// `{base}/{id}_{secret}/{layer}/{z}/{x}/{y}.png`, with `/current` for live overlays
    #[must_use]
    pub fn url_template(&self, layer: &str, current: bool) -> String {
        format!(
            "{}/{}_{}/{layer}/{{z}}/{{x}}/{{y}}{}.png",
            self.maps_base_url.trim_end_matches('/'),
            self.client_id,
            self.client_secret,
            if current { "/current" } else { "" }
        )
    }
}

/// Options for [`WeatherMap::create_comprehensive_map`]
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub tile_layer: String,
    pub show_heatmap: bool,
    pub show_zones: bool,
    pub show_overlays: bool,
    pub show_forecast: bool,
    pub show_popups: bool,
    pub overlays: Vec<String>,
    pub heatmap_metric: Metric,
    /// Heatmap points above this are thinned
    pub max_heatmap_points: Option<usize>,
    /// Dense grid cells above this collapse into cluster markers
    pub cluster_threshold: Option<usize>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            tile_layer: "satellite".to_string(),
            show_heatmap: true,
            show_zones: true,
            show_overlays: true,
            show_forecast: true,
            show_popups: true,
            overlays: OVERLAY_LAYERS.iter().map(ToString::to_string).collect(),
            heatmap_metric: Metric::Temperature,
            max_heatmap_points: None,
            cluster_threshold: None,
        }
    }
}

/// Marker fill colour for a temperature in °F
#[must_use]
pub fn temperature_color(temperature: Option<f64>) -> &'static str {
    match temperature {
        None => "gray",
        Some(t) if t < 32.0 => "blue",
        Some(t) if t < 50.0 => "lightblue",
        Some(t) if t < 70.0 => "green",
        Some(t) if t < 90.0 => "orange",
        Some(_) => "red",
    }
}

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1}"))
}

fn text_or_na(value: Option<&str>) -> String {
    value.map_or_else(|| "N/A".to_string(), escape_html)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Builder for weather map documents
#[derive(Debug, Clone)]
pub struct WeatherMap {
    center: (f64, f64),
    zoom: u8,
    tiles: TileSource,
}

impl WeatherMap {
    #[must_use]
    pub fn new(center: (f64, f64), zoom: u8, tiles: TileSource) -> Self {
        Self { center, zoom, tiles }
    }

    /// Map centred on `center`, or the configured default centre
    #[must_use]
    pub fn from_config(config: &WeatherMapConfig, center: Option<(f64, f64)>) -> Self {
        let (client_id, client_secret) = config
            .xweather
            .credentials()
            .map(|(id, secret)| (id.to_string(), secret.to_string()))
            .unwrap_or_default();
        let [lat, lon] = config.map.default_center;

        Self::new(
            center.unwrap_or((lat, lon)),
            config.map.default_zoom,
            TileSource {
                maps_base_url: config.xweather.maps_base_url.clone(),
                client_id,
                client_secret,
            },
        )
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    #[must_use]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Tile URL template for a known base layer
    #[must_use]
    pub fn base_tile_url(&self, layer: &str) -> Option<String> {
        BASE_LAYERS
            .contains(&layer)
            .then(|| self.tiles.url_template(layer, false))
    }

    /// Tile URL template for a known weather overlay
    #[must_use]
    pub fn overlay_tile_url(&self, layer: &str) -> Option<String> {
        OVERLAY_LAYERS
            .contains(&layer)
            .then(|| self.tiles.url_template(layer, true))
    }

    /// Empty map with the chosen base layer and interaction controls.
    ///
    /// Unknown layer names fall back to OpenStreetMap.
    #[must_use]
    pub fn create_base_map(&self, tile_layer: &str) -> MapDocument {
        let base_layer = match self.base_tile_url(tile_layer) {
            Some(url) => TileLayer {
                name: format!("{} Base", title_case(tile_layer)),
                url,
                attribution: XWEATHER_ATTRIBUTION.to_string(),
                overlay: false,
                opacity: 1.0,
            },
            None => {
                debug!("Using OpenStreetMap base layer for '{}'", tile_layer);
                TileLayer {
                    name: "OpenStreetMap".to_string(),
                    url: OSM_TILE_URL.to_string(),
                    attribution: OSM_ATTRIBUTION.to_string(),
                    overlay: false,
                    opacity: 1.0,
                }
            }
        };

        MapDocument {
            title: "Hyperlocal Weather Map".to_string(),
            center: [self.center.0, self.center.1],
            zoom: self.zoom,
            prefer_canvas: true,
            base_layer,
            layers: Vec::new(),
            controls: Controls {
                geocoder: true,
                locate: true,
                mouse_position: Some(MousePosition::default()),
                lat_lng_popup: true,
                layer_control: false,
            },
            legend: None,
        }
    }

    /// Add one circle marker per station, coloured by temperature
    pub fn add_weather_observations(
        &self,
        doc: &mut MapDocument,
        observations: &[Observation],
        show_popup: bool,
    ) {
        if observations.is_empty() {
            return;
        }

        let markers = observations
            .iter()
            .map(|obs| Marker::Circle(station_marker(obs, show_popup)))
            .collect();

        doc.layers.push(Layer::MarkerGroup {
            name: OBSERVATIONS_LAYER.to_string(),
            markers,
        });
    }

    /// Station markers where dense cells are replaced by cluster markers
    pub fn add_clustered_observations(
        &self,
        doc: &mut MapDocument,
        clustered: &[ClusteredMarker],
        show_popup: bool,
    ) {
        if clustered.is_empty() {
            return;
        }

        let markers = clustered
            .iter()
            .map(|entry| match entry {
                ClusteredMarker::Station(obs) => Marker::Circle(station_marker(obs, show_popup)),
                ClusteredMarker::Cluster {
                    latitude,
                    longitude,
                    count,
                    avg_temp,
                } => Marker::Circle(CircleMarker {
                    latitude: *latitude,
                    longitude: *longitude,
                    radius: 12,
                    color: "white".to_string(),
                    weight: 2,
                    fill_color: temperature_color(*avg_temp).to_string(),
                    fill_opacity: 0.8,
                    popup: Some(format!(
                        r#"<div style="font-family: Arial;"><h4>{count} stations</h4><p><strong>Avg Temp:</strong> {}°F</p></div>"#,
                        or_na(*avg_temp)
                    )),
                    popup_max_width: 250,
                    tooltip: Some(format!("{count} stations")),
                }),
            })
            .collect();

        doc.layers.push(Layer::MarkerGroup {
            name: OBSERVATIONS_LAYER.to_string(),
            markers,
        });
    }

    /// Add a heatmap layer; values are normalised to `[0, 1]`
    pub fn add_weather_heatmap(&self, doc: &mut MapDocument, points: &[HeatmapPoint]) {
        if points.is_empty() {
            return;
        }

        doc.layers.push(Layer::Heatmap {
            name: HEATMAP_LAYER.to_string(),
            points: heatmap::normalize(points),
            options: HeatmapOptions::default(),
        });
    }

    /// Add one large marker per temperature zone at its centroid
    pub fn add_weather_zones(&self, doc: &mut MapDocument, zones: &[WeatherZone]) {
        if zones.is_empty() {
            return;
        }

        let markers = zones
            .iter()
            .map(|zone| {
                let popup = format!(
                    r#"<div style="font-family: Arial;"><h4>{}</h4><p><strong>Stations:</strong> {}</p><p><strong>Avg Temp:</strong> {:.1}°F</p><p><strong>Humidity:</strong> {}%</p></div>"#,
                    zone.zone.label(),
                    zone.station_count,
                    zone.temp_mean,
                    or_na(zone.humidity_mean),
                );
                Marker::Circle(CircleMarker {
                    latitude: zone.latitude,
                    longitude: zone.longitude,
                    radius: 15,
                    color: "white".to_string(),
                    weight: 3,
                    fill_color: zone.zone.color().to_string(),
                    fill_opacity: 0.6,
                    popup: Some(popup),
                    popup_max_width: 250,
                    tooltip: None,
                })
            })
            .collect();

        doc.layers.push(Layer::MarkerGroup {
            name: ZONES_LAYER.to_string(),
            markers,
        });
    }

    /// Add Xweather weather tile overlays at 60% opacity; unknown names are skipped
    pub fn add_weather_overlays(&self, doc: &mut MapDocument, overlay_types: &[String]) {
        for overlay in overlay_types {
            let Some(url) = self.overlay_tile_url(overlay) else {
                warn!("Unknown weather overlay '{}', skipping", overlay);
                continue;
            };
            doc.layers.push(Layer::Tile(TileLayer {
                name: format!("{} Overlay", title_case(overlay)),
                url,
                attribution: XWEATHER_ATTRIBUTION.to_string(),
                overlay: true,
                opacity: 0.6,
            }));
        }
    }

    /// Add cloud pins with a popup per forecast period
    pub fn add_forecast_markers(&self, doc: &mut MapDocument, forecast: &[ForecastPeriod]) {
        if forecast.is_empty() {
            return;
        }

        let markers = forecast
            .iter()
            .map(|period| {
                let popup = format!(
                    r#"<div style="font-family: Arial; width: 250px;"><h4>Forecast - {}</h4><p><strong>High:</strong> {}°F</p><p><strong>Low:</strong> {}°F</p><p><strong>Humidity:</strong> {}%</p><p><strong>Wind:</strong> {} mph</p><p><strong>Weather:</strong> {}</p></div>"#,
                    period.date_label(),
                    or_na(period.temperature_max),
                    or_na(period.temperature_min),
                    or_na(period.humidity),
                    or_na(period.wind_speed),
                    text_or_na(period.weather.as_deref()),
                );
                Marker::Icon(IconMarker {
                    latitude: period.latitude,
                    longitude: period.longitude,
                    icon: "cloud".to_string(),
                    color: "blue".to_string(),
                    popup: Some(popup),
                    popup_max_width: 300,
                    tooltip: Some("Forecast Data".to_string()),
                })
            })
            .collect();

        doc.layers.push(Layer::MarkerGroup {
            name: FORECAST_LAYER.to_string(),
            markers,
        });
    }

    /// Full map: base, observations, heatmap, zones, forecast, overlays,
    /// layer control and temperature legend
    #[must_use]
    pub fn create_comprehensive_map(&self, data: &ProcessedWeather, options: &MapOptions) -> MapDocument {
        let mut doc = self.create_base_map(&options.tile_layer);
        let optimizer = MapPerformanceOptimizer::new();

        match options.cluster_threshold {
            Some(threshold) if data.observations.len() > threshold => {
                let clustered = optimizer.optimize_marker_clustering(&data.observations, threshold);
                self.add_clustered_observations(&mut doc, &clustered, options.show_popups);
            }
            _ => self.add_weather_observations(&mut doc, &data.observations, options.show_popups),
        }

        if options.show_heatmap {
            let mut points = heatmap::points(&data.observations, options.heatmap_metric);
            if let Some(max_points) = options.max_heatmap_points {
                points = optimizer.optimize_heatmap_data(&points, max_points);
            }
            self.add_weather_heatmap(&mut doc, &points);
        }

        if options.show_zones {
            self.add_weather_zones(&mut doc, &data.zones);
        }

        if options.show_forecast {
            self.add_forecast_markers(&mut doc, &data.forecast);
        }

        if options.show_overlays {
            self.add_weather_overlays(&mut doc, &options.overlays);
        }

        doc.controls.layer_control = true;
        doc.legend = Some(Legend::temperature());
        doc
    }

    /// Render and write the map; see [`render::save_map`]
    pub fn save_map(&self, doc: &MapDocument, path: &Path, auto_open: bool) -> crate::Result<PathBuf> {
        save_map(doc, path, auto_open)
    }
}

fn station_marker(obs: &Observation, show_popup: bool) -> CircleMarker {
    let popup = show_popup.then(|| {
        format!(
            r#"<div style="font-family: Arial; width: 200px;"><h4>{}</h4><p><strong>Temperature:</strong> {}°F</p><p><strong>Humidity:</strong> {}%</p><p><strong>Pressure:</strong> {} inHg</p><p><strong>Wind:</strong> {} mph</p><p><strong>Weather:</strong> {}</p></div>"#,
            escape_html(obs.display_name()),
            or_na(obs.temperature),
            or_na(obs.humidity),
            obs.pressure.map_or_else(|| "N/A".to_string(), |p| format!("{p:.2}")),
            or_na(obs.wind_speed),
            text_or_na(obs.weather.as_deref()),
        )
    });

    CircleMarker {
        latitude: obs.latitude,
        longitude: obs.longitude,
        radius: 8,
        color: "white".to_string(),
        weight: 2,
        fill_color: temperature_color(obs.temperature).to_string(),
        fill_opacity: 0.8,
        popup,
        popup_max_width: 250,
        tooltip: Some(format!("Temp: {}°F", or_na(obs.temperature))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::WeatherDataProcessor;
    use crate::processing::test_support::station;
    use rstest::rstest;

    fn weather_map() -> WeatherMap {
        WeatherMap::new(
            (40.7128, -74.0060),
            10,
            TileSource {
                maps_base_url: "https://maps.api.xweather.com".to_string(),
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
        )
    }

    #[rstest]
    #[case(None, "gray")]
    #[case(Some(10.0), "blue")]
    #[case(Some(32.0), "lightblue")]
    #[case(Some(49.9), "lightblue")]
    #[case(Some(50.0), "green")]
    #[case(Some(70.0), "orange")]
    #[case(Some(90.0), "red")]
    fn test_temperature_color(#[case] temp: Option<f64>, #[case] color: &str) {
        assert_eq!(temperature_color(temp), color);
    }

    #[test]
    fn test_tile_urls() {
        let map = weather_map();
        assert_eq!(
            map.base_tile_url("terrain").unwrap(),
            "https://maps.api.xweather.com/id_secret/terrain/{z}/{x}/{y}.png"
        );
        assert_eq!(
            map.overlay_tile_url("radar").unwrap(),
            "https://maps.api.xweather.com/id_secret/radar/{z}/{x}/{y}/current.png"
        );
        assert!(map.base_tile_url("radar").is_none());
        assert!(map.overlay_tile_url("hurricanes").is_none());
    }

    #[test]
    fn test_base_map_fallback() {
        let map = weather_map();

        let doc = map.create_base_map("satellite");
        assert_eq!(doc.base_layer.name, "Satellite Base");
        assert!(doc.controls.geocoder);
        assert_eq!(doc.controls.mouse_position.as_ref().unwrap().prefix, "Coords:");

        let doc = map.create_base_map("watercolor");
        assert_eq!(doc.base_layer.name, "OpenStreetMap");
        assert_eq!(doc.base_layer.url, OSM_TILE_URL);
    }

    #[test]
    fn test_observation_markers() {
        let map = weather_map();
        let mut doc = map.create_base_map("street");
        let mut named = station(40.7, -74.0, Some(55.34));
        named.name = Some("<b>Central Park</b>".to_string());

        map.add_weather_observations(&mut doc, &[named, station(40.8, -74.1, None)], true);

        let Some(Layer::MarkerGroup { markers, .. }) = doc.layer(OBSERVATIONS_LAYER) else {
            panic!("observation layer missing");
        };
        let Marker::Circle(first) = &markers[0] else {
            panic!("expected circle marker");
        };
        assert_eq!(first.radius, 8);
        assert_eq!(first.color, "white");
        assert_eq!(first.fill_color, "green");
        assert_eq!(first.tooltip.as_deref(), Some("Temp: 55.3°F"));
        let popup = first.popup.as_deref().unwrap();
        assert!(popup.contains("&lt;b&gt;Central Park"));
        assert!(!popup.contains("<b>Central Park"));

        let Marker::Circle(second) = &markers[1] else {
            panic!("expected circle marker");
        };
        assert_eq!(second.fill_color, "gray");
        assert_eq!(second.tooltip.as_deref(), Some("Temp: N/A°F"));
    }

    #[test]
    fn test_popups_can_be_disabled() {
        let map = weather_map();
        let mut doc = map.create_base_map("street");
        map.add_weather_observations(&mut doc, &[station(40.7, -74.0, Some(60.0))], false);

        let Some(Layer::MarkerGroup { markers, .. }) = doc.layer(OBSERVATIONS_LAYER) else {
            panic!("observation layer missing");
        };
        assert!(matches!(&markers[0], Marker::Circle(m) if m.popup.is_none()));
    }

    #[test]
    fn test_empty_inputs_add_nothing() {
        let map = weather_map();
        let mut doc = map.create_base_map("street");
        map.add_weather_observations(&mut doc, &[], true);
        map.add_weather_heatmap(&mut doc, &[]);
        map.add_weather_zones(&mut doc, &[]);
        map.add_forecast_markers(&mut doc, &[]);
        assert!(doc.layers.is_empty());
    }

    #[test]
    fn test_overlays() {
        let map = weather_map();
        let mut doc = map.create_base_map("street");
        map.add_weather_overlays(
            &mut doc,
            &["radar".to_string(), "bogus".to_string(), "wind".to_string()],
        );

        assert_eq!(doc.layers.len(), 2);
        let Some(Layer::Tile(radar)) = doc.layer("Radar Overlay") else {
            panic!("radar overlay missing");
        };
        assert!(radar.overlay);
        assert_eq!(radar.opacity, 0.6);
        assert!(radar.url.ends_with("/current.png"));
    }

    #[test]
    fn test_comprehensive_map() {
        let map = weather_map();
        let processor = WeatherDataProcessor::default();
        let observations = vec![
            station(40.70, -74.00, Some(30.0)),
            station(40.72, -74.01, Some(50.0)),
            station(40.74, -73.99, Some(52.0)),
            station(40.76, -73.98, Some(70.0)),
        ];
        let data = ProcessedWeather {
            zones: processor.create_weather_zones(&observations, 5.0),
            observations,
            ..ProcessedWeather::default()
        };

        let doc = map.create_comprehensive_map(&data, &MapOptions::default());
        assert_eq!(doc.marker_count(), 4 + data.zones.len());
        assert!(doc.layer(HEATMAP_LAYER).is_some());
        assert!(doc.layer(ZONES_LAYER).is_some());
        assert!(doc.layer("Temperatures Overlay").is_some());
        assert!(doc.controls.layer_control);
        assert!(doc.legend.is_some());

        let Some(Layer::Heatmap { points, options, .. }) = doc.layer(HEATMAP_LAYER) else {
            panic!("heatmap missing");
        };
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| (0.0..=1.0).contains(&p[2])));
        assert_eq!(options.radius, 25);

        let minimal = map.create_comprehensive_map(
            &data,
            &MapOptions {
                show_heatmap: false,
                show_zones: false,
                show_overlays: false,
                ..MapOptions::default()
            },
        );
        assert_eq!(minimal.layers.len(), 1);
    }

    #[test]
    fn test_comprehensive_map_clusters_and_thins() {
        let map = weather_map();
        let observations: Vec<Observation> = (0..6)
            .map(|i| station(40.7125 + f64::from(i) * 0.001, -74.0055, Some(50.0)))
            .collect();
        let data = ProcessedWeather {
            observations,
            ..ProcessedWeather::default()
        };

        let doc = map.create_comprehensive_map(
            &data,
            &MapOptions {
                cluster_threshold: Some(3),
                max_heatmap_points: Some(2),
                show_overlays: false,
                ..MapOptions::default()
            },
        );

        assert_eq!(doc.marker_count(), 1);
        let Some(Layer::Heatmap { points, .. }) = doc.layer(HEATMAP_LAYER) else {
            panic!("heatmap missing");
        };
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_forecast_markers() {
        let map = weather_map();
        let mut doc = map.create_base_map("street");
        let processor = WeatherDataProcessor::default();
        let forecast = processor.clean_forecast(vec![crate::models::ForecastRecord {
            latitude: Some(40.7),
            longitude: Some(-74.0),
            datetime: Some("2024-03-06T07:00:00-05:00".to_string()),
            temperature_max: Some(61.0),
            ..Default::default()
        }]);

        map.add_forecast_markers(&mut doc, &forecast);
        let Some(Layer::MarkerGroup { markers, .. }) = doc.layer(FORECAST_LAYER) else {
            panic!("forecast layer missing");
        };
        let Marker::Icon(pin) = &markers[0] else {
            panic!("expected icon marker");
        };
        assert_eq!(pin.icon, "cloud");
        let popup = pin.popup.as_deref().unwrap();
        assert!(popup.contains("Forecast - 2024-03-06"));
        assert!(popup.contains("<strong>High:</strong> 61.0°F"));
        assert!(popup.contains("<strong>Low:</strong> N/A°F"));
    }
}
