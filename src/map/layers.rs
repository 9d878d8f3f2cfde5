//! Serializable map document
//!
//! The document is a plain description of a Leaflet map. It is embedded as
//! JSON in the rendered page, where a small script builds the actual layers.

use serde::{Deserialize, Serialize};

/// Raster tile layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub name: String,
    /// URL template with `{z}`, `{x}` and `{y}` placeholders
    pub url: String,
    pub attribution: String,
    pub overlay: bool,
    pub opacity: f64,
}

/// Vector circle marker, sized in pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: u32,
    /// Border colour
    pub color: String,
    /// Border width
    pub weight: u32,
    pub fill_color: String,
    pub fill_opacity: f64,
    /// Popup HTML, already escaped
    pub popup: Option<String>,
    pub popup_max_width: u32,
    pub tooltip: Option<String>,
}

/// Pin marker with a Font Awesome glyph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub icon: String,
    pub color: String,
    pub popup: Option<String>,
    pub popup_max_width: u32,
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    Circle(CircleMarker),
    Icon(IconMarker),
}

/// Options passed through to `leaflet.heat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapOptions {
    pub min_opacity: f64,
    pub max_zoom: u8,
    pub radius: u32,
    pub blur: u32,
    /// `(stop, colour)` pairs in ascending order
    pub gradient: Vec<(f64, String)>,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            min_opacity: 0.2,
            max_zoom: 18,
            radius: 25,
            blur: 15,
            gradient: [(0.2, "blue"), (0.4, "cyan"), (0.6, "lime"), (0.8, "yellow"), (1.0, "red")]
                .into_iter()
                .map(|(stop, color)| (stop, color.to_string()))
                .collect(),
        }
    }
}

/// An overlay in the map's layer list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Tile(TileLayer),
    MarkerGroup {
        name: String,
        markers: Vec<Marker>,
    },
    Heatmap {
        name: String,
        /// `[lat, lon, intensity]` with intensity in `[0, 1]`
        points: Vec<[f64; 3]>,
        options: HeatmapOptions,
    },
}

impl Layer {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Layer::Tile(tile) => &tile.name,
            Layer::MarkerGroup { name, .. } | Layer::Heatmap { name, .. } => name,
        }
    }
}

/// Cursor coordinate readout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MousePosition {
    pub position: String,
    pub separator: String,
    pub empty_string: String,
    pub lng_first: bool,
    pub num_digits: u8,
    pub prefix: String,
}

impl Default for MousePosition {
    fn default() -> Self {
        Self {
            position: "bottomright".to_string(),
            separator: " | ".to_string(),
            empty_string: "NaN".to_string(),
            lng_first: true,
            num_digits: 6,
            prefix: "Coords:".to_string(),
        }
    }
}

/// Interaction controls attached to the map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// Place search box that drops a marker on the result
    pub geocoder: bool,
    /// "Locate me" button that keeps the current zoom
    pub locate: bool,
    pub mouse_position: Option<MousePosition>,
    /// Click anywhere to see its latitude/longitude
    pub lat_lng_popup: bool,
    pub layer_control: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub title: String,
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    /// Legend matching the observation marker colours
    #[must_use]
    pub fn temperature() -> Self {
        let entries = [
            ("blue", "< 32°F (Freezing)"),
            ("lightblue", "32-50°F (Cold)"),
            ("green", "50-70°F (Cool)"),
            ("orange", "70-90°F (Warm)"),
            ("red", "> 90°F (Hot)"),
        ]
        .into_iter()
        .map(|(color, label)| LegendEntry {
            color: color.to_string(),
            label: label.to_string(),
        })
        .collect();

        Self {
            title: "Temperature Legend".to_string(),
            entries,
        }
    }
}

/// Complete description of one map page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDocument {
    pub title: String,
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub prefer_canvas: bool,
    pub base_layer: TileLayer,
    pub layers: Vec<Layer>,
    pub controls: Controls,
    pub legend: Option<Legend>,
}

impl MapDocument {
    /// Total markers across all marker groups
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| match layer {
                Layer::MarkerGroup { markers, .. } => markers.len(),
                _ => 0,
            })
            .sum()
    }

    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }
}
