//! Location model for geographic coordinates and metadata

use crate::WeatherMapError;
use serde::{Deserialize, Serialize};

/// Check that a coordinate pair is a valid WGS84 latitude/longitude
pub fn validate_coordinates(latitude: f64, longitude: f64) -> crate::Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(WeatherMapError::validation(format!(
            "Latitude must be between -90 and 90, got: {latitude}"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(WeatherMapError::validation(format!(
            "Longitude must be between -180 and 180, got: {longitude}"
        )));
    }
    Ok(())
}

/// `true` when the pair passes [`validate_coordinates`]
#[must_use]
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    validate_coordinates(latitude, longitude).is_ok()
}

/// Location coordinates
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Location name (city, region, etc.)
    pub name: String,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: String) -> Self {
        Self {
            latitude,
            longitude,
            name,
        }
    }

    /// Create a location named after its own coordinates
    #[must_use]
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, format!("{latitude:.4}, {longitude:.4}"))
    }

    /// Create a validated location
    pub fn validated(latitude: f64, longitude: f64, name: String) -> crate::Result<Self> {
        validate_coordinates(latitude, longitude)?;
        Ok(Self::new(latitude, longitude, name))
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// File-name friendly version of the name, e.g. `new_york_city`
    #[must_use]
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let parts: Vec<&str> = slug.split('_').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            "location".to_string()
        } else {
            parts.join("_")
        }
    }
}

/// Great-circle distance between two `(lat, lon)` pairs in kilometers
#[must_use]
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    haversine::distance(
        haversine::Location {
            latitude: from.0,
            longitude: from.1,
        },
        haversine::Location {
            latitude: to.0,
            longitude: to.1,
        },
        haversine::Units::Kilometers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(40.7128, -74.0060).is_ok());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_location_slug() {
        let location = Location::new(40.7128, -74.0060, "New York City".to_string());
        assert_eq!(location.slug(), "new_york_city");

        let location = Location::new(48.85, 2.35, "Paris, France".to_string());
        assert_eq!(location.slug(), "paris_france");

        let location = Location::new(0.0, 0.0, "  ".to_string());
        assert_eq!(location.slug(), "location");
    }

    #[test]
    fn test_from_coordinates_name() {
        let location = Location::from_coordinates(46.8182, 8.2275);
        assert_eq!(location.name, "46.8182, 8.2275");
        assert_eq!(location.format_coordinates(), "46.8182, 8.2275");
    }

    #[test]
    fn test_haversine_km() {
        let nyc = (40.7128, -74.0060);
        let la_distance = haversine_km(nyc, (34.0522, -118.2437));
        assert!((3900.0..4000.0).contains(&la_distance));
        assert!(haversine_km(nyc, nyc).abs() < 1e-9);
    }
}
