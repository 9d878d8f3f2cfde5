//! Xweather API client
//!
//! This module provides the HTTP client for retrieving station observations and
//! point forecasts from the Xweather data API, with client-side rate limiting,
//! transient-failure retries, an optional on-disk response cache and error
//! classification.

use crate::cache::PersistentCache;
use crate::config::{WeatherMapConfig, XweatherConfig};
use crate::models::{ForecastRecord, ObservationRecord};
use crate::{ErrorCode, Result, WeatherMapError};
use parking_lot::Mutex;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("HyperlocalWeatherMap/", env!("CARGO_PKG_VERSION"));

/// Rate limiter for API requests
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests per window
    max_requests: u32,
    /// Sliding window length
    window: Duration,
    /// Request timestamps within the current window
    request_times: Vec<Instant>,
}

impl RateLimiter {
    /// Create a new per-minute rate limiter
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self::with_window(max_requests_per_minute, Duration::from_secs(60))
    }

    /// Create a rate limiter over an arbitrary window
    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            request_times: Vec::new(),
        }
    }

    /// Check if a request is allowed and record it
    pub fn allow_request(&mut self) -> bool {
        self.cleanup_old_requests();

        if self.request_times.len() >= self.max_requests as usize {
            false
        } else {
            self.request_times.push(Instant::now());
            true
        }
    }

    /// Get time until next request is allowed
    pub fn time_until_next_request(&mut self) -> Duration {
        self.cleanup_old_requests();

        if self.request_times.len() < self.max_requests as usize {
            return Duration::ZERO;
        }
        self.request_times
            .first()
            .map_or(Duration::ZERO, |oldest| self.window.saturating_sub(oldest.elapsed()))
    }

    /// Remove requests older than the window
    fn cleanup_old_requests(&mut self) {
        let window = self.window;
        self.request_times.retain(|time| time.elapsed() < window);
    }
}

/// Client for the Xweather observations and forecasts endpoints
pub struct XweatherClient {
    http: ClientWithMiddleware,
    /// Same transport without the retry layer, for cheap reachability checks
    probe: reqwest::Client,
    config: XweatherConfig,
    client_id: String,
    client_secret: String,
    rate_limiter: Mutex<RateLimiter>,
    cache: Option<PersistentCache>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for XweatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XweatherClient")
            .field("base_url", &self.config.base_url)
            .field("client_id", &self.client_id)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl XweatherClient {
    /// Create a new client. Fails when either credential is missing.
    pub fn new(config: &WeatherMapConfig) -> Result<Self> {
        let xweather = config.xweather.clone();
        let (client_id, client_secret) = xweather
            .credentials()
            .map(|(id, secret)| (id.to_string(), secret.to_string()))
            .ok_or_else(|| {
                WeatherMapError::config("Both Xweather client ID and client secret are required")
            })?;

        let probe = reqwest::Client::builder()
            .timeout(Duration::from_secs(xweather.timeout_seconds.into()))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherMapError::config(format!("Failed to create HTTP client: {e}")))?;

        let backoff_min = Duration::from_millis(xweather.backoff_base_ms);
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(backoff_min, backoff_min.saturating_mul(30))
            .build_with_max_retries(xweather.max_retries);

        let http = ClientBuilder::new(probe.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            http,
            probe,
            rate_limiter: Mutex::new(RateLimiter::new(xweather.requests_per_minute)),
            config: xweather,
            client_id,
            client_secret,
            cache: None,
            cache_ttl: Duration::from_secs(config.cache.ttl_seconds),
        })
    }

    /// Attach an on-disk response cache
    #[must_use]
    pub fn with_cache(mut self, cache: PersistentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Get current observations from stations around a point
    #[instrument(skip(self))]
    pub async fn get_observations(
        &self,
        lat: f64,
        lon: f64,
        radius_km: u32,
    ) -> Result<Vec<ObservationRecord>> {
        let endpoint = format!("{}/observations/{lat},{lon}", self.base_url());
        let params = BTreeMap::from([
            ("radius", format!("{radius_km}km")),
            ("limit", self.config.observation_limit.to_string()),
        ]);

        let fetched = self.make_request(&endpoint, &params).await?;
        let envelope: xweather::Envelope<xweather::ObservationItem> =
            parse_body(&fetched.body, &endpoint)?;
        let items = envelope.into_items()?;
        self.remember(&fetched).await;

        if items.is_empty() {
            warn!("No observations found within {}km of {:.4}, {:.4}", radius_km, lat, lon);
            return Ok(Vec::new());
        }

        let records: Vec<ObservationRecord> =
            items.into_iter().map(ObservationRecord::from).collect();
        info!("Received {} observation rows", records.len());
        Ok(records)
    }

    /// Get the daily forecast for a point
    #[instrument(skip(self))]
    pub async fn get_forecast(&self, lat: f64, lon: f64, days: u32) -> Result<Vec<ForecastRecord>> {
        let endpoint = format!("{}/forecasts/{lat},{lon}", self.base_url());
        let params = BTreeMap::from([("limit", days.to_string())]);

        let fetched = self.make_request(&endpoint, &params).await?;
        let envelope: xweather::Envelope<xweather::ForecastItem> =
            parse_body(&fetched.body, &endpoint)?;
        let items = envelope.into_items()?;
        self.remember(&fetched).await;

        let periods = items
            .into_iter()
            .next()
            .map(|item| item.periods)
            .unwrap_or_default();

        if periods.is_empty() {
            warn!("No forecast data found for {:.4}, {:.4}", lat, lon);
            return Ok(Vec::new());
        }

        Ok(periods
            .into_iter()
            .map(|period| period.into_record(lat, lon))
            .collect())
    }

    /// Get observations and, optionally, the forecast for a point
    #[instrument(skip(self))]
    pub async fn get_hyperlocal_data(
        &self,
        center_lat: f64,
        center_lon: f64,
        radius_km: u32,
        include_forecast: bool,
    ) -> Result<(Vec<ObservationRecord>, Vec<ForecastRecord>)> {
        info!("Fetching hyperlocal data for {}, {}", center_lat, center_lon);

        let observations = self.get_observations(center_lat, center_lon, radius_km).await?;

        let forecast = if include_forecast {
            self.get_forecast(center_lat, center_lon, self.config.forecast_days)
                .await?
        } else {
            Vec::new()
        };

        Ok((observations, forecast))
    }

    /// Check that a concrete tile URL answers with a success status
    pub async fn probe_tile(&self, url: &str) -> bool {
        match self.probe.get(url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Tile probe returned HTTP {}", response.status());
                false
            }
            Err(e) => {
                warn!("Tile host unreachable: {}", e);
                false
            }
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Rate-limit and send a GET request unless the cache already holds the body.
    ///
    /// Nothing is written to the cache here; callers store the body with
    /// [`Self::remember`] once the payload has been accepted.
    async fn make_request(&self, endpoint: &str, params: &BTreeMap<&str, String>) -> Result<Fetched> {
        let cache_key = cache_key(endpoint, params);

        if let Some(cache) = &self.cache {
            match cache.get::<String>(&cache_key).await {
                Ok(Some(body)) => {
                    info!("Returning cached data");
                    return Ok(Fetched {
                        body,
                        cache_key,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Cache lookup failed, continuing without it: {}", e),
            }
        }

        self.wait_for_rate_limit().await;

        info!("Making request to {}", endpoint);
        let request_start = Instant::now();

        let mut url = reqwest::Url::parse(endpoint).map_err(|e| {
            WeatherMapError::config(format!("Invalid Xweather endpoint {endpoint}: {e}"))
        })?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| {
                let reason = self.redact(&request_error_text(e));
                error!("API request failed: {}", reason);
                WeatherMapError::api_with_context(
                    format!("Network error: {reason}"),
                    ErrorCode::ApiNetworkError,
                    HashMap::from([("endpoint".to_string(), endpoint.to_string())]),
                )
            })?;

        let status = response.status();
        debug!(
            "HTTP response received: {} in {:.3}s",
            status,
            request_start.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), endpoint));
        }

        let body = response.text().await.map_err(|e| {
            WeatherMapError::api_with_context(
                format!("Failed to read response body: {}", e.without_url()),
                ErrorCode::ApiNetworkError,
                HashMap::from([("endpoint".to_string(), endpoint.to_string())]),
            )
        })?;

        let total = request_start.elapsed();
        info!("Successful API request in {:.3}s", total.as_secs_f64());
        if total.as_secs() > 5 {
            warn!("Slow API response detected: {:.3}s", total.as_secs_f64());
        }

        Ok(Fetched {
            body,
            cache_key,
            from_cache: false,
        })
    }

    /// Store an accepted response body for later requests
    async fn remember(&self, fetched: &Fetched) {
        let Some(cache) = &self.cache else {
            return;
        };
        if fetched.from_cache {
            return;
        }
        if let Err(e) = cache
            .put(&fetched.cache_key, fetched.body.clone(), self.cache_ttl)
            .await
        {
            warn!("Failed to cache response: {}", e);
        }
    }

    /// Mask the credentials wherever they appear in `message`
    fn redact(&self, message: &str) -> String {
        redact_credentials(message, &[&self.client_id, &self.client_secret])
    }

    async fn wait_for_rate_limit(&self) {
        loop {
            let wait = {
                let mut limiter = self.rate_limiter.lock();
                if limiter.allow_request() {
                    return;
                }
                limiter.time_until_next_request()
            };
            let wait = wait.max(Duration::from_millis(50));
            warn!("Rate limit exceeded, waiting {:.1}s", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }
}

/// Response body together with the cache slot it belongs to
struct Fetched {
    body: String,
    cache_key: String,
    from_cache: bool,
}

/// Error text without the request URL, which carries the credentials
fn request_error_text(error: reqwest_middleware::Error) -> String {
    match error {
        reqwest_middleware::Error::Reqwest(e) => e.without_url().to_string(),
        reqwest_middleware::Error::Middleware(e) => format!("{e:#}"),
    }
}

/// Replace every occurrence of each non-empty secret with `***`
fn redact_credentials(message: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(message.to_string(), |text, secret| text.replace(secret, "***"))
}

/// Deterministic cache key; credentials never take part in it
fn cache_key(endpoint: &str, params: &BTreeMap<&str, String>) -> String {
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{endpoint}?{}", query.join("&"))
}

fn classify_status(status: u16, endpoint: &str) -> WeatherMapError {
    let context = HashMap::from([
        ("status_code".to_string(), status.to_string()),
        ("endpoint".to_string(), endpoint.to_string()),
    ]);
    match status {
        401 | 403 => {
            error!("API authentication failed (HTTP {})", status);
            WeatherMapError::api_with_context(
                "Invalid Xweather credentials",
                ErrorCode::ApiUnauthorized,
                context,
            )
        }
        404 => {
            warn!("Location not found (HTTP 404)");
            WeatherMapError::api_with_context(
                "Location not found. Please check the coordinates.",
                ErrorCode::ApiLocationNotFound,
                context,
            )
        }
        429 => {
            error!("Rate limit exceeded and retry attempts exhausted");
            WeatherMapError::api_with_context(
                "Rate limit exceeded and retry attempts exhausted.",
                ErrorCode::ApiRateLimit,
                context,
            )
        }
        _ => {
            error!("API request failed with HTTP {}", status);
            WeatherMapError::api_with_context(
                format!("API request failed with status: {status}"),
                ErrorCode::ApiNetworkError,
                context,
            )
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str, endpoint: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse response from {}: {}", endpoint, e);
        WeatherMapError::api_with_context(
            "Invalid data received from Xweather API",
            ErrorCode::ApiInvalidResponse,
            HashMap::from([
                ("endpoint".to_string(), endpoint.to_string()),
                ("error".to_string(), e.to_string()),
            ]),
        )
    })
}

/// Xweather API response structures and conversion utilities
pub mod xweather {
    use crate::models::lenient;
    use crate::models::{ForecastRecord, ObservationRecord};
    use crate::{ErrorCode, Result, WeatherMapError};
    use serde::Deserialize;
    use std::collections::HashMap;

    /// Provider warning code for an empty but otherwise valid query
    pub const NO_DATA_WARNING: &str = "warn_no_data";

    /// Common response wrapper: `{ success, error, response }`
    #[derive(Debug, Deserialize)]
    pub struct Envelope<T> {
        #[serde(default)]
        pub success: bool,
        #[serde(default)]
        pub error: Option<ErrorBody>,
        #[serde(default)]
        pub response: Option<OneOrMany<T>>,
    }

    /// Single-location endpoints answer with an object, searches with an array
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        pub code: Option<String>,
        pub description: Option<String>,
    }

    impl<T> Envelope<T> {
        /// Unwrap the payload, turning `success: false` into an API error
        pub fn into_items(self) -> Result<Vec<T>> {
            if !self.success {
                let (code, description) = self.error.map_or((None, None), |e| (e.code, e.description));
                let description = description.unwrap_or_else(|| "Unknown error".to_string());
                let mut context = HashMap::new();
                if let Some(code) = code {
                    context.insert("provider_code".to_string(), code);
                }
                return Err(WeatherMapError::api_with_context(
                    description,
                    ErrorCode::ApiInvalidResponse,
                    context,
                ));
            }

            if let Some(ErrorBody {
                code: Some(code), ..
            }) = &self.error
            {
                if code == NO_DATA_WARNING {
                    tracing::debug!("Provider reported no data for the query");
                }
            }

            Ok(match self.response {
                Some(OneOrMany::Many(items)) => items,
                Some(OneOrMany::One(item)) => vec![item],
                None => Vec::new(),
            })
        }
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Loc {
        #[serde(default, deserialize_with = "lenient::f64")]
        pub lat: Option<f64>,
        #[serde(default, deserialize_with = "lenient::f64")]
        pub long: Option<f64>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Place {
        #[serde(default, deserialize_with = "lenient::string")]
        pub name: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Ob {
        #[serde(default, rename = "tempF", deserialize_with = "lenient::f64")]
        pub temp_f: Option<f64>,
        #[serde(default, deserialize_with = "lenient::f64")]
        pub humidity: Option<f64>,
        #[serde(default, rename = "pressureIN", deserialize_with = "lenient::f64")]
        pub pressure_in: Option<f64>,
        #[serde(default, rename = "windSpeedMPH", deserialize_with = "lenient::f64")]
        pub wind_speed_mph: Option<f64>,
        #[serde(default, deserialize_with = "lenient::string")]
        pub wind_dir: Option<String>,
        #[serde(default, deserialize_with = "lenient::string")]
        pub weather: Option<String>,
        #[serde(default, rename = "dateTimeISO", deserialize_with = "lenient::string")]
        pub date_time_iso: Option<String>,
    }

    /// One station in an observations response
    #[derive(Debug, Default, Deserialize)]
    pub struct ObservationItem {
        #[serde(default, deserialize_with = "lenient::string")]
        pub id: Option<String>,
        #[serde(default)]
        pub loc: Option<Loc>,
        #[serde(default)]
        pub place: Option<Place>,
        #[serde(default)]
        pub ob: Option<Ob>,
    }

    impl From<ObservationItem> for ObservationRecord {
        fn from(item: ObservationItem) -> Self {
            let loc = item.loc.unwrap_or_default();
            let ob = item.ob.unwrap_or_default();
            ObservationRecord {
                station_id: item.id,
                name: item.place.and_then(|p| p.name),
                latitude: loc.lat,
                longitude: loc.long,
                temperature: ob.temp_f,
                humidity: ob.humidity,
                pressure: ob.pressure_in,
                wind_speed: ob.wind_speed_mph,
                wind_direction: ob.wind_dir,
                weather: ob.weather,
                timestamp: ob.date_time_iso,
            }
        }
    }

    /// One location in a forecasts response
    #[derive(Debug, Default, Deserialize)]
    pub struct ForecastItem {
        #[serde(default)]
        pub periods: Vec<Period>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Period {
        #[serde(default, rename = "dateTimeISO", deserialize_with = "lenient::string")]
        pub date_time_iso: Option<String>,
        #[serde(default, rename = "maxTempF", deserialize_with = "lenient::f64")]
        pub max_temp_f: Option<f64>,
        #[serde(default, rename = "minTempF", deserialize_with = "lenient::f64")]
        pub min_temp_f: Option<f64>,
        #[serde(default, deserialize_with = "lenient::f64")]
        pub humidity: Option<f64>,
        #[serde(default, rename = "pressureIN", deserialize_with = "lenient::f64")]
        pub pressure_in: Option<f64>,
        #[serde(default, rename = "windSpeedMPH", deserialize_with = "lenient::f64")]
        pub wind_speed_mph: Option<f64>,
        #[serde(default, rename = "windDir", deserialize_with = "lenient::string")]
        pub wind_dir: Option<String>,
        #[serde(default, deserialize_with = "lenient::string")]
        pub weather: Option<String>,
        #[serde(default, rename = "precipIN", deserialize_with = "lenient::f64")]
        pub precip_in: Option<f64>,
        #[serde(default, rename = "snowIN", deserialize_with = "lenient::f64")]
        pub snow_in: Option<f64>,
    }

    impl Period {
        /// Attach the requested point to a forecast period
        #[must_use]
        pub fn into_record(self, lat: f64, lon: f64) -> ForecastRecord {
            ForecastRecord {
                latitude: Some(lat),
                longitude: Some(lon),
                datetime: self.date_time_iso,
                temperature_max: self.max_temp_f,
                temperature_min: self.min_temp_f,
                humidity: self.humidity,
                pressure: self.pressure_in,
                wind_speed: self.wind_speed_mph,
                wind_direction: self.wind_dir,
                weather: self.weather,
                precipitation_in: self.precip_in,
                snow_in: self.snow_in,
            }
        }
    }
}
