//! Config defaults and section validation tests for weather-loader-config.
// crates/weather-loader-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults and Section Validation Tests
// Description: Validate default behavior and per-section invariants.
// Purpose: Ensure a minimal config is valid and bad settings fail closed.
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

use std::path::PathBuf;

use weather_loader_config::AuditSinkKind;
use weather_loader_config::StoreType;
use weather_loader_config::WeatherLoaderConfig;
use weather_loader_config::config_toml_example;
use weather_loader_store_sqlite::SqliteStoreMode;

/// Shared config fixtures.
mod common;

use common::assert_invalid;

type TestResult = Result<(), String>;

#[test]
fn minimal_config_applies_defaults() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    if config.store.store_type != StoreType::Sqlite {
        return Err("store type should default to sqlite".to_string());
    }
    if config.store.sqlite_config().path != PathBuf::from("weather-loader.db") {
        return Err("sqlite path should default to weather-loader.db".to_string());
    }
    let worker = config.worker_config();
    if worker.batch_size != 50 || worker.max_attempts != 3 || worker.max_error_chars != 255 {
        return Err(format!("unexpected worker defaults: {worker:?}"));
    }
    if worker.stale_lock_ms.is_some() {
        return Err("stale lock reclaim must be opt-in".to_string());
    }
    if config.server.default_city != "Cieszyn" {
        return Err("default city should be Cieszyn".to_string());
    }
    if config.audit.sink != AuditSinkKind::Stderr {
        return Err("audit sink should default to stderr".to_string());
    }
    Ok(())
}

#[test]
fn example_config_validates() -> TestResult {
    let config = WeatherLoaderConfig::from_toml_str(&config_toml_example())
        .map_err(|err| err.to_string())?;
    if config.store.journal_mode != SqliteStoreMode::Wal {
        return Err("example should use wal journal mode".to_string());
    }
    if config.integrity.secret_env.as_deref() != Some("WEATHER_LOADER_SECRET") {
        return Err("example should read the secret from the environment".to_string());
    }
    Ok(())
}

#[test]
fn missing_integrity_section_is_a_parse_error() -> TestResult {
    assert_invalid(WeatherLoaderConfig::from_toml_str(""), "config parse error")
}

#[test]
fn integrity_requires_exactly_one_source() -> TestResult {
    assert_invalid(
        WeatherLoaderConfig::from_toml_str("[integrity]\n"),
        "integrity requires secret or secret_env",
    )?;
    assert_invalid(
        WeatherLoaderConfig::from_toml_str(
            "[integrity]\nsecret = \"a\"\nsecret_env = \"WEATHER_LOADER_SECRET\"\n",
        ),
        "mutually exclusive",
    )?;
    assert_invalid(
        WeatherLoaderConfig::from_toml_str("[integrity]\nsecret = \"\"\n"),
        "integrity.secret must be non-empty",
    )
}

#[test]
fn integrity_debug_redacts_secret() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    let rendered = format!("{:?}", config.integrity);
    if rendered.contains("ThisIsASecretKey") {
        return Err("secret leaked through Debug".to_string());
    }
    Ok(())
}

#[test]
fn inline_secret_resolves() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    let secret = config.integrity.resolve_secret().map_err(|err| err.to_string())?;
    if secret.as_bytes() != b"ThisIsASecretKey" {
        return Err("resolved secret does not match inline value".to_string());
    }
    Ok(())
}

#[test]
fn unset_secret_env_fails_to_resolve() -> TestResult {
    let config = WeatherLoaderConfig::from_toml_str(
        "[integrity]\nsecret_env = \"WEATHER_LOADER_TEST_SECRET_THAT_IS_NEVER_SET\"\n",
    )
    .map_err(|err| err.to_string())?;
    assert_invalid(config.integrity.resolve_secret(), "is not set")
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    let text = format!("{}[store]\ntype = \"memory\"\npath = \"x.db\"\n", common::MINIMAL_TOML);
    assert_invalid(WeatherLoaderConfig::from_toml_str(&text), "memory store must not set path")
}

#[test]
fn store_busy_timeout_must_be_positive() -> TestResult {
    let text = format!("{}[store]\nbusy_timeout_ms = 0\n", common::MINIMAL_TOML);
    assert_invalid(WeatherLoaderConfig::from_toml_str(&text), "store.busy_timeout_ms")
}

#[test]
fn worker_limits_are_enforced() -> TestResult {
    for (body, needle) in [
        ("batch_size = 0", "worker.batch_size"),
        ("batch_size = 1001", "worker.batch_size"),
        ("max_attempts = 0", "worker.max_attempts"),
        ("max_error_chars = 0", "worker.max_error_chars"),
        ("stale_lock_secs = 0", "worker.stale_lock_secs"),
        ("poll_interval_ms = 10", "worker.poll_interval_ms"),
    ] {
        let text = format!("{}[worker]\n{body}\n", common::MINIMAL_TOML);
        assert_invalid(WeatherLoaderConfig::from_toml_str(&text), needle)?;
    }
    Ok(())
}

#[test]
fn stale_lock_secs_converts_to_millis() -> TestResult {
    let text = format!("{}[worker]\nstale_lock_secs = 30\n", common::MINIMAL_TOML);
    let config = WeatherLoaderConfig::from_toml_str(&text).map_err(|err| err.to_string())?;
    if config.worker_config().stale_lock_ms != Some(30_000) {
        return Err("stale_lock_secs should convert to milliseconds".to_string());
    }
    Ok(())
}

#[test]
fn server_settings_are_validated() -> TestResult {
    for (body, needle) in [
        ("bind = \"not-an-address\"", "invalid bind address"),
        ("max_body_bytes = 0", "server.max_body_bytes"),
        ("default_city = \"  \"", "server.default_city must be non-empty"),
    ] {
        let text = format!("{}[server]\n{body}\n", common::MINIMAL_TOML);
        assert_invalid(WeatherLoaderConfig::from_toml_str(&text), needle)?;
    }
    Ok(())
}

#[test]
fn upstream_settings_are_validated() -> TestResult {
    for (body, needle) in [
        ("geocoding_url = \"ftp://example.com\"", "must be an http(s) url"),
        ("forecast_url = \"https:///v1\"", "must include a host"),
        ("timeout_ms = 5", "upstream.timeout_ms"),
        ("language = \"\"", "upstream.language must be non-empty"),
    ] {
        let text = format!("{}[upstream]\n{body}\n", common::MINIMAL_TOML);
        assert_invalid(WeatherLoaderConfig::from_toml_str(&text), needle)?;
    }
    Ok(())
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let text = format!("{}[audit]\nsink = \"file\"\n", common::MINIMAL_TOML);
    assert_invalid(WeatherLoaderConfig::from_toml_str(&text), "requires audit.path")
}

#[test]
fn unknown_enum_values_fail_to_parse() -> TestResult {
    let text = format!("{}[audit]\nsink = \"syslog\"\n", common::MINIMAL_TOML);
    assert_invalid(WeatherLoaderConfig::from_toml_str(&text), "config parse error")
}
