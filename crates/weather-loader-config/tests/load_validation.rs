//! File loading tests for weather-loader-config.
// crates/weather-loader-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate file size, encoding, and path limits on load.
// Purpose: Ensure config files are read fail-closed.
// =============================================================================

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;

use weather_loader_config::ConfigError;
use weather_loader_config::WeatherLoaderConfig;

/// Shared config fixtures.
mod common;

use common::assert_invalid;

type TestResult = Result<(), String>;

#[test]
fn load_reads_explicit_path() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("weather-loader.toml");
    fs::write(&path, common::MINIMAL_TOML).map_err(|err| err.to_string())?;
    let config = WeatherLoaderConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.integrity.secret.as_deref() != Some("ThisIsASecretKey") {
        return Err("loaded config lost the inline secret".to_string());
    }
    Ok(())
}

#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    match WeatherLoaderConfig::load(Some(&path)) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    let mut text = common::MINIMAL_TOML.to_string();
    text.push('#');
    text.push_str(&"x".repeat(1024 * 1024));
    text.push('\n');
    fs::write(&path, text).map_err(|err| err.to_string())?;
    assert_invalid(WeatherLoaderConfig::load(Some(&path)), "exceeds size limit")
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("binary.toml");
    fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).map_err(|err| err.to_string())?;
    assert_invalid(WeatherLoaderConfig::load(Some(&path)), "must be utf-8")
}

#[test]
fn load_rejects_overlong_path_component() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join(format!("{}.toml", "a".repeat(300)));
    assert_invalid(WeatherLoaderConfig::load(Some(&path)), "config path component too long")
}

#[test]
fn load_rejects_invalid_contents() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("invalid.toml");
    fs::write(&path, format!("{}[worker]\nbatch_size = 0\n", common::MINIMAL_TOML))
        .map_err(|err| err.to_string())?;
    assert_invalid(WeatherLoaderConfig::load(Some(&path)), "worker.batch_size")
}
