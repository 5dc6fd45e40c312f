// crates/weather-loader-api/src/upstream.rs
// ============================================================================
// Module: Upstream Weather Source
// Description: City geocoding and current-temperature lookup.
// Purpose: Produce the (location, value, timestamp) triple for the fetch action.
// Dependencies: weather-loader-config, weather-loader-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`WeatherSource`] is the seam between the API and the weather provider.
//! [`OpenMeteoSource`] resolves a city with the Open-Meteo geocoding API and
//! then reads `current.temperature_2m` from the forecast API in UTC. Both
//! calls share one client with a bounded timeout and a response size cap.
//!
//! Upstream failures are never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use weather_loader_config::UpstreamConfig;
use weather_loader_core::utc_minute_now;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum upstream response body size in bytes.
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Current observation for a city.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Observation {
    /// Resolved location name.
    pub location: String,
    /// Temperature in degrees Celsius.
    pub value: f64,
    /// Observation instant, always suffixed with `Z`.
    pub timestamp: String,
}

/// Upstream lookup errors. Display strings are returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Geocoding returned no results.
    #[error("City not found")]
    NotFound,
    /// Transport, decoding, or content failure.
    #[error("{0}")]
    Failed(String),
}

/// Source of current weather observations.
pub trait WeatherSource: Send + Sync {
    /// Returns the current observation for `city`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::NotFound`] for unknown cities and
    /// [`UpstreamError::Failed`] for any other failure.
    fn current(&self, city: &str) -> Result<Observation, UpstreamError>;
}

// ============================================================================
// SECTION: Open-Meteo
// ============================================================================

/// Open-Meteo backed weather source.
pub struct OpenMeteoSource {
    /// Geocoding endpoint.
    geocoding_url: Url,
    /// Forecast endpoint.
    forecast_url: Url,
    /// Geocoding result language.
    language: String,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl OpenMeteoSource {
    /// Creates a source from upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Failed`] when an endpoint is invalid or the
    /// client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let geocoding_url = Url::parse(&config.geocoding_url)
            .map_err(|_| UpstreamError::Failed("invalid geocoding url".to_string()))?;
        let forecast_url = Url::parse(&config.forecast_url)
            .map_err(|_| UpstreamError::Failed("invalid forecast url".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(3))
            .build()
            .map_err(|_| UpstreamError::Failed("http client build failed".to_string()))?;
        Ok(Self {
            geocoding_url,
            forecast_url,
            language: config.language.clone(),
            client,
        })
    }

    /// Resolves a city into `(latitude, longitude, name)`.
    fn geocode(&self, city: &str) -> Result<(f64, f64, String), UpstreamError> {
        let mut url = self.geocoding_url.clone();
        url.query_pairs_mut()
            .append_pair("name", city)
            .append_pair("count", "1")
            .append_pair("language", &self.language)
            .append_pair("format", "json");
        let body = self.get_json(url)?;
        let Some(first) = body.get("results").and_then(|results| results.get(0)) else {
            return Err(UpstreamError::NotFound);
        };
        let latitude = first.get("latitude").and_then(Value::as_f64);
        let longitude = first.get("longitude").and_then(Value::as_f64);
        let name = first.get("name").and_then(Value::as_str);
        match (latitude, longitude, name) {
            (Some(latitude), Some(longitude), Some(name)) => {
                Ok((latitude, longitude, name.to_string()))
            }
            _ => Err(UpstreamError::Failed("Invalid geocoding result".to_string())),
        }
    }

    /// Reads the current temperature and its instant at a coordinate.
    fn forecast(&self, latitude: f64, longitude: f64) -> Result<(f64, String), UpstreamError> {
        let mut url = self.forecast_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &latitude.to_string())
            .append_pair("longitude", &longitude.to_string())
            .append_pair("current", "temperature_2m")
            .append_pair("timezone", "UTC");
        let body = self.get_json(url)?;
        let current = body.get("current");
        let temperature = current
            .and_then(|current| current.get("temperature_2m"))
            .and_then(Value::as_f64)
            .ok_or_else(|| UpstreamError::Failed("No temperature".to_string()))?;
        let time = current
            .and_then(|current| current.get("time"))
            .and_then(Value::as_str)
            .map_or_else(utc_minute_now, str::to_string);
        Ok((temperature, time))
    }

    /// Performs a GET and parses the body as JSON.
    fn get_json(&self, url: Url) -> Result<Value, UpstreamError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|_| UpstreamError::Failed("Fetch failed".to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Failed("Fetch failed".to_string()));
        }
        let body = read_response_limited(&mut response, MAX_RESPONSE_BYTES)?;
        serde_json::from_slice(&body).map_err(|_| UpstreamError::Failed("Invalid JSON".to_string()))
    }
}

impl WeatherSource for OpenMeteoSource {
    fn current(&self, city: &str) -> Result<Observation, UpstreamError> {
        let (latitude, longitude, location) = self.geocode(city)?;
        let (value, time) = self.forecast(latitude, longitude)?;
        Ok(Observation {
            location,
            value,
            timestamp: with_utc_suffix(time),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends `Z` unless the instant already carries it.
fn with_utc_suffix(mut time: String) -> String {
    if !time.ends_with('Z') {
        time.push('Z');
    }
    time
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut reqwest::blocking::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, UpstreamError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| UpstreamError::Failed("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(UpstreamError::Failed("Response too large".to_string()));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|_| UpstreamError::Failed("Fetch failed".to_string()))?;
    if buf.len() > max_bytes {
        return Err(UpstreamError::Failed("Response too large".to_string()));
    }
    Ok(buf)
}
