// crates/weather-loader-api/tests/upstream.rs
// ============================================================================
// Module: Upstream Weather Source Tests
// Description: Open-Meteo adapter behavior against a local stub server.
// Purpose: Validate query construction, not-found handling, and failure mapping.
// Dependencies: weather-loader-api, weather-loader-config, tiny_http
// ============================================================================

//! ## Overview
//! A `tiny_http` server stands in for both Open-Meteo endpoints and answers
//! requests in order, recording the URLs it receives.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use tiny_http::Response;
use tiny_http::Server;
use weather_loader_api::OpenMeteoSource;
use weather_loader_api::UpstreamError;
use weather_loader_api::WeatherSource;
use weather_loader_config::UpstreamConfig;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

const GEOCODE_CIESZYN: &str =
    r#"{"results":[{"name":"Cieszyn","latitude":49.75,"longitude":18.63,"country":"Polska"}]}"#;
const FORECAST_OK: &str = r#"{"current":{"time":"2025-12-28T17:00","temperature_2m":0.4}}"#;

/// Spawns a server answering each request with the next `(body, status)` pair.
fn spawn_upstream(
    responses: Vec<(&'static str, u16)>,
) -> (String, Arc<Mutex<Vec<String>>>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let handle = thread::spawn(move || {
        for (body, status) in responses {
            let Ok(request) = server.recv() else {
                return;
            };
            recorded.lock().unwrap().push(request.url().to_string());
            let _ = request.respond(Response::from_string(body).with_status_code(status));
        }
    });
    (url, seen, handle)
}

fn source_for(base: &str) -> OpenMeteoSource {
    OpenMeteoSource::new(&UpstreamConfig {
        geocoding_url: format!("{base}/v1/search"),
        forecast_url: format!("{base}/v1/forecast"),
        timeout_ms: 5_000,
        ..UpstreamConfig::default()
    })
    .unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn resolves_city_then_reads_current_temperature() {
    let (url, seen, handle) = spawn_upstream(vec![(GEOCODE_CIESZYN, 200), (FORECAST_OK, 200)]);
    let observation = source_for(&url).current("Cieszyn").unwrap();
    handle.join().unwrap();

    assert_eq!(observation.location, "Cieszyn");
    assert_eq!(observation.value, 0.4);
    assert_eq!(observation.timestamp, "2025-12-28T17:00Z");

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].starts_with("/v1/search?"));
    for param in ["name=Cieszyn", "count=1", "language=pl", "format=json"] {
        assert!(seen[0].contains(param), "geocoding url {} lacks {param}", seen[0]);
    }
    assert!(seen[1].starts_with("/v1/forecast?"));
    for param in ["latitude=49.75", "longitude=18.63", "current=temperature_2m", "timezone=UTC"] {
        assert!(seen[1].contains(param), "forecast url {} lacks {param}", seen[1]);
    }
}

#[test]
fn city_names_are_query_encoded() {
    let (url, seen, handle) = spawn_upstream(vec![(r#"{"results":[]}"#, 200)]);
    let _ = source_for(&url).current("Bielsko-Biała & Co");
    handle.join().unwrap();
    let seen = seen.lock().unwrap().clone();
    assert!(!seen[0].contains(' '));
    assert!(seen[0].contains("name=Bielsko-Bia%C5%82a+%26+Co"));
}

#[test]
fn empty_geocoding_result_is_not_found() {
    let (url, seen, handle) = spawn_upstream(vec![(r#"{"generationtime_ms":0.2}"#, 200)]);
    let result = source_for(&url).current("Atlantis");
    handle.join().unwrap();
    assert_eq!(result, Err(UpstreamError::NotFound));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn missing_temperature_is_failure() {
    let forecast = r#"{"current":{"time":"2025-12-28T17:00"}}"#;
    let (url, _seen, handle) = spawn_upstream(vec![(GEOCODE_CIESZYN, 200), (forecast, 200)]);
    let result = source_for(&url).current("Cieszyn");
    handle.join().unwrap();
    assert_eq!(result, Err(UpstreamError::Failed("No temperature".to_string())));
}

#[test]
fn missing_time_falls_back_to_current_minute() {
    let forecast = r#"{"current":{"temperature_2m":-3.5}}"#;
    let (url, _seen, handle) = spawn_upstream(vec![(GEOCODE_CIESZYN, 200), (forecast, 200)]);
    let observation = source_for(&url).current("Cieszyn").unwrap();
    handle.join().unwrap();
    assert_eq!(observation.value, -3.5);
    assert!(observation.timestamp.ends_with('Z'));
    assert!(weather_loader_core::normalize_timestamp(&observation.timestamp).is_ok());
}

#[test]
fn invalid_json_is_failure() {
    let (url, _seen, handle) = spawn_upstream(vec![("<html>busy</html>", 200)]);
    let result = source_for(&url).current("Cieszyn");
    handle.join().unwrap();
    assert_eq!(result, Err(UpstreamError::Failed("Invalid JSON".to_string())));
}

#[test]
fn upstream_error_status_is_failure() {
    let (url, _seen, handle) = spawn_upstream(vec![("{}", 503)]);
    let result = source_for(&url).current("Cieszyn");
    handle.join().unwrap();
    assert_eq!(result, Err(UpstreamError::Failed("Fetch failed".to_string())));
}

#[test]
fn unreachable_upstream_is_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let result = source_for(&format!("http://{addr}")).current("Cieszyn");
    assert_eq!(result, Err(UpstreamError::Failed("Fetch failed".to_string())));
}

#[test]
fn rejects_unparseable_endpoint() {
    let result = OpenMeteoSource::new(&UpstreamConfig {
        geocoding_url: "not a url".to_string(),
        ..UpstreamConfig::default()
    });
    assert!(matches!(result, Err(UpstreamError::Failed(_))));
}
