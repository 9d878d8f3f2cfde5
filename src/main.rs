//! Hyperlocal Weather Map CLI
//!
//! Fetches nearby weather stations and renders them onto an interactive HTML map.

#![allow(clippy::print_stdout)]

use anyhow::{Context, bail};
use clap::Parser;
use hyperlocal_weather_map::app::{DEMO_RADIUS_KM, demo_locations};
use hyperlocal_weather_map::{
    HyperlocalWeatherApp, Location, MapOptions, WeatherMapConfig, WeatherMapError, logging,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

const DEFAULT_OUTPUT: &str = "weather_map.html";

/// Hyperlocal Weather Map
#[derive(Parser, Debug)]
#[command(name = "hyperlocal-weather-map")]
#[command(author, version, about = "Interactive maps of hyperlocal weather observations", long_about = None)]
struct Cli {
    /// Latitude of the map centre
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the map centre
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Place name to geocode (e.g. "Paris, France")
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    place: Option<String>,

    /// Prompt for a place interactively
    #[arg(long)]
    interactive: bool,

    /// Search radius in km
    #[arg(long)]
    radius: Option<u32>,

    /// Build maps for New York, Los Angeles and Chicago
    #[arg(long)]
    demo: bool,

    /// Output file; the output directory with --demo
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base tile layer
    #[arg(long, value_parser = ["satellite", "terrain", "street"])]
    tile_layer: Option<String>,

    /// Weather overlay to show (repeatable)
    #[arg(long = "overlay", value_parser = ["radar", "temperatures", "wind"])]
    overlays: Vec<String>,

    /// Do not automatically open the map in a browser
    #[arg(long)]
    no_open: bool,

    /// Skip the forecast request
    #[arg(long)]
    no_forecast: bool,

    /// Hide the temperature heatmap
    #[arg(long)]
    no_heatmap: bool,

    /// Hide temperature zones
    #[arg(long)]
    no_zones: bool,

    /// Hide Xweather tile overlays
    #[arg(long)]
    no_overlays: bool,

    /// Bypass the on-disk response cache
    #[arg(long)]
    no_cache: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn map_options(&self, app: &HyperlocalWeatherApp) -> MapOptions {
        let mut options = app.default_map_options();
        if let Some(layer) = &self.tile_layer {
            options.tile_layer.clone_from(layer);
        }
        if !self.overlays.is_empty() {
            options.overlays.clone_from(&self.overlays);
        }
        options.show_heatmap = !self.no_heatmap;
        options.show_zones = !self.no_zones;
        options.show_overlays = !self.no_overlays;
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Application failed: {:#}", e);
            let message = e
                .downcast_ref::<WeatherMapError>()
                .map_or_else(|| format!("{e:#}"), WeatherMapError::user_message);
            eprintln!("❌ {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = WeatherMapConfig::load_from_path(cli.config.clone())?;
    if cli.no_cache {
        config.cache.enabled = false;
    }
    logging::init(&config.logging, cli.verbose);

    let app = HyperlocalWeatherApp::new(config)?;
    let auto_open = !cli.no_open;

    if cli.demo {
        return run_demo(&app, &cli, auto_open).await;
    }

    let place = match (&cli.place, cli.interactive) {
        (Some(place), _) => Some(place.clone()),
        (None, true) => Some(prompt_for_place()?),
        (None, false) => None,
    };

    let location = match place {
        Some(place) => app.resolve_location(&place).await?,
        None => {
            let [default_lat, default_lon] = app.config().map.default_center;
            let (lat, lon) = (cli.lat.unwrap_or(default_lat), cli.lon.unwrap_or(default_lon));
            Location::validated(lat, lon, format!("{lat:.4}, {lon:.4}"))?
        }
    };

    let radius = cli.radius.unwrap_or(app.config().map.default_radius_km);
    let data = app
        .get_weather_data(location.latitude, location.longitude, radius, !cli.no_forecast)
        .await?;

    let output = cli.output.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let map_path = app
        .create_weather_map(&data, &output, &cli.map_options(&app), auto_open)
        .await?;

    println!("✅ Weather map created successfully: {}", map_path.display());
    if auto_open {
        println!("🌐 Map should have opened automatically in your browser!");
    } else {
        println!("🌐 Open the file in your browser to view the interactive map");
    }
    Ok(())
}

async fn run_demo(app: &HyperlocalWeatherApp, cli: &Cli, auto_open: bool) -> anyhow::Result<()> {
    println!("🌤️ Hyperlocal Weather Map Demo");
    println!("{}", "=".repeat(50));

    let out_dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let radius = cli.radius.unwrap_or(DEMO_RADIUS_KM);
    let outcomes = app
        .run_demo(&demo_locations(), radius, &out_dir, auto_open)
        .await;

    let mut created = 0;
    for outcome in &outcomes {
        let location = &outcome.location;
        println!("\n📍 {} ({})", location.name, location.format_coordinates());
        println!("{}", "-".repeat(30));

        match &outcome.result {
            Ok((path, summary)) => {
                created += 1;
                println!("✅ Map created: {}", path.display());
                println!("📊 Observations: {} stations", summary.stations);
                if let Some((lo, hi)) = summary.temperature_range {
                    println!("🌡️ Temperature range: {lo:.1}°F - {hi:.1}°F");
                }
                if let Some((lo, hi)) = summary.humidity_range {
                    println!("💧 Humidity range: {lo:.1}% - {hi:.1}%");
                }
                if summary.forecast_periods > 0 {
                    println!("🔮 Forecast periods: {}", summary.forecast_periods);
                }
            }
            Err(message) => println!("❌ Failed to process {}: {message}", location.name),
        }
    }

    if created == 0 {
        bail!("Demo failed for every location");
    }
    println!("\n🎉 Demo completed: {created} of {} maps created", outcomes.len());
    Ok(())
}

fn prompt_for_place() -> anyhow::Result<String> {
    print!("Enter a place (e.g., 'Berlin, Germany' or '1600 Amphitheatre Pkwy, Mountain View'): ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read place from stdin")?;

    let place = line.trim().to_string();
    if place.is_empty() {
        bail!("No place entered");
    }
    Ok(place)
}
