// crates/weather-loader-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for weather-loader-config.
// =============================================================================

//! Shared fixtures for the config integration suites.

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use weather_loader_config::ConfigError;
use weather_loader_config::WeatherLoaderConfig;

/// Smallest config that validates: an inline integrity secret.
pub const MINIMAL_TOML: &str = "[integrity]\nsecret = \"ThisIsASecretKey\"\n";

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<WeatherLoaderConfig, ConfigError> {
    WeatherLoaderConfig::from_toml_str(MINIMAL_TOML)
}

/// Asserts that a validation result failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
