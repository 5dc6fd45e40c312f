// crates/weather-loader-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and `config example`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Weather Loader configuration. The output is static
//! and must always pass [`crate::WeatherLoaderConfig::from_toml_str`].

/// Returns a canonical example `weather-loader.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[integrity]
secret_env = "WEATHER_LOADER_SECRET"
# secret = "ThisIsASecretKey"

[store]
type = "sqlite"
path = "weather-loader.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 8000

[worker]
batch_size = 50
max_attempts = 3
max_error_chars = 255
# stale_lock_secs = 300
# poll_interval_ms = 5000

[server]
bind = "127.0.0.1:8080"
max_body_bytes = 65536
default_city = "Cieszyn"

[upstream]
geocoding_url = "https://geocoding-api.open-meteo.com/v1/search"
forecast_url = "https://api.open-meteo.com/v1/forecast"
timeout_ms = 8000
user_agent = "weather-loader/0.1"
language = "pl"

[audit]
sink = "stderr"
# sink = "file"
# path = "weather-loader-audit.jsonl"
"#,
    )
}
