//! Place-name resolution
//!
//! Free-form location input is either a coordinate pair or a place name; names
//! are resolved through a Nominatim-compatible search endpoint.

use crate::config::GeocodingConfig;
use crate::models::Location;
use crate::models::location::validate_coordinates;
use crate::{ErrorCode, Result, WeatherMapError};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Types of location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Coordinates (latitude, longitude)
    Coordinates(f64, f64),
    /// Place name such as "Central Park, New York"
    Name(String),
}

/// Location input parser
pub struct LocationParser;

impl LocationParser {
    /// Parse location input (coordinates or place name)
    pub fn parse(input: &str) -> Result<LocationInput> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WeatherMapError::validation("Location cannot be empty"));
        }

        if let Some((lat, lon)) = Self::split_coordinates(input) {
            validate_coordinates(lat, lon)?;
            return Ok(LocationInput::Coordinates(lat, lon));
        }

        Ok(LocationInput::Name(input.to_string()))
    }

    /// Split strings like "46.8182,8.2275" or "46.8182 8.2275" into numbers
    fn split_coordinates(input: &str) -> Option<(f64, f64)> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        match parts.as_slice() {
            [lat, lon] => Some((lat.parse().ok()?, lon.parse().ok()?)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Nominatim search client
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(crate::api::USER_AGENT)
            .build()
            .map_err(|e| WeatherMapError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Resolve parsed input into a location; coordinates pass through unchanged
    pub async fn resolve(&self, input: LocationInput) -> Result<Location> {
        match input {
            LocationInput::Coordinates(lat, lon) => Ok(Location::from_coordinates(lat, lon)),
            LocationInput::Name(name) => self.geocode_place(&name).await,
        }
    }

    /// Look up a place name and return the best match
    #[instrument(skip(self))]
    pub async fn geocode_place(&self, query: &str) -> Result<Location> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                WeatherMapError::api(format!("Geocoding request failed: {e}"), ErrorCode::ApiNetworkError)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherMapError::api(
                format!("Geocoding failed with status: {status}"),
                ErrorCode::ApiNetworkError,
            ));
        }

        let hits: Vec<SearchHit> = response.json().await.map_err(|e| {
            WeatherMapError::api(
                format!("Invalid geocoding response: {e}"),
                ErrorCode::ApiInvalidResponse,
            )
        })?;
        debug!("Geocoding took {:.3}s", start.elapsed().as_secs_f64());

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| WeatherMapError::validation(format!("Location not found: {query}")))?;

        let latitude: f64 = hit.lat.parse().map_err(|_| {
            WeatherMapError::api(
                format!("Invalid latitude in geocoding response: {}", hit.lat),
                ErrorCode::ApiInvalidResponse,
            )
        })?;
        let longitude: f64 = hit.lon.parse().map_err(|_| {
            WeatherMapError::api(
                format!("Invalid longitude in geocoding response: {}", hit.lon),
                ErrorCode::ApiInvalidResponse,
            )
        })?;

        let name = hit.display_name.unwrap_or_else(|| query.to_string());
        info!("Resolved '{}' to {:.4}, {:.4}", query, latitude, longitude);
        Location::validated(latitude, longitude, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("46.8182,8.2275", 46.8182, 8.2275)]
    #[case("46.8182 8.2275", 46.8182, 8.2275)]
    #[case(" 40.7128, -74.0060 ", 40.7128, -74.006)]
    fn test_parse_coordinates(#[case] input: &str, #[case] lat: f64, #[case] lon: f64) {
        assert_eq!(
            LocationParser::parse(input).unwrap(),
            LocationInput::Coordinates(lat, lon)
        );
    }

    #[rstest]
    #[case("Central Park, New York")]
    #[case("Chicago")]
    #[case("Los Angeles")]
    fn test_parse_names(#[case] input: &str) {
        assert_eq!(
            LocationParser::parse(input).unwrap(),
            LocationInput::Name(input.to_string())
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range_coordinates() {
        assert!(LocationParser::parse("91.0,0.0").is_err());
        assert!(LocationParser::parse("0.0,181.0").is_err());
        assert!(LocationParser::parse("   ").is_err());
    }
}
