//! End-to-end tests: mock Xweather and Nominatim, real processing and rendering

use hyperlocal_weather_map::app::demo_locations;
use hyperlocal_weather_map::{HyperlocalWeatherApp, WeatherMapConfig};
use serde_json::json;
use std::fs;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> WeatherMapConfig {
    let mut config = WeatherMapConfig::default();
    config.xweather.client_id = Some("test_id".to_string());
    config.xweather.client_secret = Some("test_secret".to_string());
    config.xweather.base_url = server.uri();
    config.xweather.maps_base_url = server.uri();
    config.xweather.max_retries = 0;
    config.xweather.backoff_base_ms = 1;
    config.geocoding.base_url = format!("{}/search", server.uri());
    config.cache.enabled = false;
    config.map.verify_tiles = false;
    config
}

fn observations_body() -> serde_json::Value {
    json!({
        "success": true,
        "response": [
            {
                "id": "KNYC",
                "loc": { "lat": 40.78, "long": -73.97 },
                "place": { "name": "central park" },
                "ob": { "tempF": 41, "humidity": 80, "pressureIN": 30.1, "windSpeedMPH": 5, "weather": "Cloudy" }
            },
            {
                "id": "KLGA",
                "loc": { "lat": 40.77, "long": -73.87 },
                "place": { "name": "la guardia" },
                "ob": { "tempF": 39, "humidity": 75, "weather": "Light Rain" }
            },
            {
                "id": "KJFK",
                "loc": { "lat": 40.64, "long": -73.78 },
                "place": { "name": "kennedy" },
                "ob": { "tempF": 44, "humidity": 70 }
            },
            {
                "id": "BROKEN",
                "loc": { "lat": null, "long": -73.0 },
                "ob": { "tempF": 50 }
            }
        ]
    })
}

fn forecast_body() -> serde_json::Value {
    json!({
        "success": true,
        "response": [{
            "periods": [
                { "dateTimeISO": "2024-01-15T07:00:00-05:00", "maxTempF": 45, "minTempF": 30, "weather": "Sunny" },
                { "dateTimeISO": "2024-01-16T07:00:00-05:00", "maxTempF": 48, "minTempF": 33, "weather": "Snow Showers" }
            ]
        }]
    })
}

async fn mount_data_api(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex("^/observations/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(observations_body()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/forecasts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn weather_data_is_cleaned_and_processed() {
    let server = MockServer::start().await;
    mount_data_api(&server).await;

    let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
    let data = app.get_weather_data(40.7128, -74.006, 30, true).await.unwrap();

    assert_eq!(data.observations.len(), 3);
    assert!(data.observations.iter().all(|o| o.weather_icon.is_some()));
    assert_eq!(data.forecast.len(), 2);
    assert!(!data.grid.is_empty());
    assert!(!data.zones.is_empty());
    assert_eq!(data.gradients.len(), 3);
}

#[tokio::test]
async fn invalid_request_never_reaches_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
    assert!(app.get_weather_data(95.0, 0.0, 30, true).await.is_err());
    assert!(app.get_weather_data(40.0, -74.0, 0, true).await.is_err());
}

#[tokio::test]
async fn repeated_requests_use_processed_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/observations/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(observations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
    let first = app.get_weather_data(40.7128, -74.006, 30, false).await.unwrap();
    let second = app.get_weather_data(40.7128, -74.006, 30, false).await.unwrap();
    assert_eq!(first.observations, second.observations);
}

#[tokio::test]
async fn map_is_written_to_disk() {
    let server = MockServer::start().await;
    mount_data_api(&server).await;

    let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
    let data = app.get_weather_data(40.7128, -74.006, 30, true).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("maps").join("nyc.html");
    let path = app
        .create_weather_map(&data, &output, &app.default_map_options(), false)
        .await
        .unwrap();

    assert!(path.is_absolute());
    let html = fs::read_to_string(&path).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Weather Observations"));
    assert!(html.contains("Temperature Heatmap"));
    assert!(html.contains("Weather Forecast"));
    assert!(html.contains("central park"));
    assert!(html.contains("Temp: 41.0°F"));
    assert!(html.contains("test_id_test_secret/satellite/"));
    assert!(html.contains("/radar/{z}/{x}/{y}/current.png"));
}

#[tokio::test]
async fn unreachable_tiles_fall_back_to_openstreetmap() {
    let server = MockServer::start().await;
    mount_data_api(&server).await;

    let mut config = test_config(&server);
    config.map.verify_tiles = true;
    let app = HyperlocalWeatherApp::new(config).unwrap();
    let data = app.get_weather_data(40.7128, -74.006, 30, false).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = app
        .create_weather_map(&data, &dir.path().join("map.html"), &app.default_map_options(), false)
        .await
        .unwrap();

    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("tile.openstreetmap.org"));
    assert!(!html.contains("test_id_test_secret/satellite/"));
}

#[tokio::test]
async fn reachable_tiles_are_kept() {
    let server = MockServer::start().await;
    mount_data_api(&server).await;
    Mock::given(method("GET"))
        .and(path_regex("^/test_id_test_secret/satellite/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.map.verify_tiles = true;
    let app = HyperlocalWeatherApp::new(config).unwrap();
    let data = app.get_weather_data(40.7128, -74.006, 30, false).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = app
        .create_weather_map(&data, &dir.path().join("map.html"), &app.default_map_options(), false)
        .await
        .unwrap();

    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("test_id_test_secret/satellite/"));
}

#[tokio::test]
async fn demo_continues_past_a_failing_city() {
    let server = MockServer::start().await;
    // Los Angeles
    Mock::given(method("GET"))
        .and(path_regex("^/observations/34\\.0522"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_data_api(&server).await;

    let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let outcomes = app.run_demo(&demo_locations(), 30, dir.path(), false).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].location.name, "New York City");
    assert!(outcomes[0].result.is_ok());
    let reason = outcomes[1].result.as_ref().unwrap_err();
    assert!(reason.contains("Unable to connect to Xweather"));
    assert!(outcomes[2].result.is_ok());

    assert!(dir.path().join("demo_new_york_city_weather.html").exists());
    assert!(!dir.path().join("demo_los_angeles_weather.html").exists());
    assert!(dir.path().join("demo_chicago_weather.html").exists());

    let (_, summary) = outcomes[2].result.as_ref().unwrap();
    assert_eq!(summary.stations, 3);
    assert_eq!(summary.temperature_range, Some((39.0, 44.0)));
    assert_eq!(summary.forecast_periods, 2);
}

mod geocoding_tests {
    use super::*;

    #[tokio::test]
    async fn place_names_are_geocoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Paris, France"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "lat": "48.8566", "lon": "2.3522", "display_name": "Paris, Ile-de-France, France" }
            ])))
            .mount(&server)
            .await;

        let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
        let location = app.resolve_location("Paris, France").await.unwrap();

        assert_eq!(location.name, "Paris, Ile-de-France, France");
        assert!((location.latitude - 48.8566).abs() < 1e-9);
        assert!((location.longitude - 2.3522).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_place_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
        let err = app.resolve_location("Atlantis").await.unwrap_err();
        assert!(err.to_string().contains("Location not found: Atlantis"));
    }

    #[tokio::test]
    async fn coordinates_skip_the_geocoder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let app = HyperlocalWeatherApp::new(test_config(&server)).unwrap();
        let location = app.resolve_location("40.7128, -74.0060").await.unwrap();
        assert_eq!(location.latitude, 40.7128);
        assert_eq!(location.longitude, -74.006);
    }
}
