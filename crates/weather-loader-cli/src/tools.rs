// crates/weather-loader-cli/src/tools.rs
// ============================================================================
// Module: CLI Tools
// Description: Operations behind the sign, verify, worker, and report commands.
// Purpose: Reuse the gateway's codecs and the server's store wiring offline.
// Dependencies: weather-loader-api, weather-loader-config, weather-loader-core
// ============================================================================

//! ## Overview
//! `sign` plays the producer role of the browser form: it seals a record and
//! wraps it in the submission envelope. `verify` accepts whatever a client
//! would send (an envelope, a bare record, or raw base64) and reports the
//! integrity breakdown. `worker run` and `report` open the configured store
//! and run one pass or collect a diagnostics snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use weather_loader_api::build_audit_sink;
use weather_loader_api::build_pipeline_store;
use weather_loader_api::build_worker;
use weather_loader_config::WeatherLoaderConfig;
use weather_loader_core::BatchSummary;
use weather_loader_core::DiagnosticsReport;
use weather_loader_core::Envelope;
use weather_loader_core::IntegrityCodec;
use weather_loader_core::MeasurementRecord;
use weather_loader_core::SharedSecret;
use weather_loader_core::Verification;
use weather_loader_core::core::envelope;
use weather_loader_core::decode_record_or_envelope;
use weather_loader_core::normalize_timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Output of the `sign` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedMeasurement {
    /// Canonical string the checksum covers.
    pub canonical: String,
    /// Sealed record.
    pub record: MeasurementRecord,
    /// Envelope ready to POST to `/weather`.
    pub envelope: Envelope,
}

/// Errors raised by CLI tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Configuration could not be loaded or resolved.
    #[error("config error: {0}")]
    Config(String),
    /// Command input was rejected.
    #[error("invalid input: {0}")]
    Input(String),
    /// Store, audit sink, or worker failure.
    #[error("runtime error: {0}")]
    Runtime(String),
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

/// Builds the integrity codec from an explicit secret or the config file.
///
/// # Errors
///
/// Returns [`ToolError::Config`] when the config cannot be loaded or names no
/// usable secret, and [`ToolError::Input`] for an empty explicit secret.
pub fn resolve_codec(
    secret: Option<&str>,
    config_path: Option<&Path>,
) -> Result<IntegrityCodec, ToolError> {
    if let Some(secret) = secret {
        return IntegrityCodec::new(&SharedSecret::from(secret))
            .map_err(|err| ToolError::Input(err.to_string()));
    }
    let config = load_config(config_path)?;
    let secret = config.integrity.resolve_secret().map_err(|err| ToolError::Config(err.to_string()))?;
    IntegrityCodec::new(&secret).map_err(|err| ToolError::Config(err.to_string()))
}

/// Seals a measurement and wraps it in a submission envelope.
///
/// The timestamp is signed exactly as given; it must still parse as an
/// instant the worker will accept.
///
/// # Errors
///
/// Returns [`ToolError::Input`] for a non-finite value or an unparseable
/// timestamp.
pub fn sign_measurement(
    codec: &IntegrityCodec,
    measurement: &str,
    location: &str,
    value: f64,
    timestamp: &str,
) -> Result<SignedMeasurement, ToolError> {
    if !value.is_finite() {
        return Err(ToolError::Input("value must be a finite number".to_string()));
    }
    normalize_timestamp(timestamp).map_err(|err| ToolError::Input(err.to_string()))?;
    let record = codec.seal(MeasurementRecord::unsigned(measurement, location, value, timestamp));
    let canonical = IntegrityCodec::canonicalize(&record);
    let envelope =
        envelope::encode(&record).map_err(|err| ToolError::Runtime(err.to_string()))?;
    Ok(SignedMeasurement {
        canonical,
        record,
        envelope,
    })
}

/// Checks the integrity of a submitted payload.
///
/// With `base64` set the input is the `DataBase64` value itself; otherwise it
/// is JSON holding either an envelope or a bare record.
///
/// # Errors
///
/// Returns [`ToolError::Input`] when the payload cannot be decoded into a
/// record. A checksum mismatch is not an error; it is reported in the
/// returned [`Verification`].
pub fn verify_input(
    codec: &IntegrityCodec,
    input: &str,
    base64: bool,
) -> Result<Verification, ToolError> {
    let object = if base64 {
        envelope::decode_base64_record(input).map_err(|err| ToolError::Input(err.to_string()))?
    } else {
        let value: Value = serde_json::from_str(input)
            .map_err(|_| ToolError::Input("Invalid JSON".to_string()))?;
        decode_record_or_envelope(&value).map_err(|err| ToolError::Input(err.to_string()))?
    };
    let record =
        MeasurementRecord::from_json_object(&object).map_err(|err| ToolError::Input(err.to_string()))?;
    Ok(codec.inspect(&record))
}

// ============================================================================
// SECTION: Store Operations
// ============================================================================

/// Runs one worker pass against the configured store.
///
/// # Errors
///
/// Returns [`ToolError::Runtime`] when the store or audit sink cannot be
/// opened or the pass fails.
pub fn run_worker_pass(config: &WeatherLoaderConfig) -> Result<BatchSummary, ToolError> {
    let store =
        build_pipeline_store(&config.store).map_err(|err| ToolError::Runtime(err.to_string()))?;
    let audit = build_audit_sink(&config.audit)
        .map_err(|err| ToolError::Runtime(format!("audit sink init failed: {err}")))?;
    build_worker(config, store, audit)
        .run_batch()
        .map_err(|err| ToolError::Runtime(err.to_string()))
}

/// Collects a diagnostics snapshot from the configured store.
///
/// # Errors
///
/// Returns [`ToolError::Input`] for a zero limit and [`ToolError::Runtime`]
/// when the store cannot be read.
pub fn collect_report(
    config: &WeatherLoaderConfig,
    limit: usize,
) -> Result<DiagnosticsReport, ToolError> {
    if limit == 0 {
        return Err(ToolError::Input("limit must be at least 1".to_string()));
    }
    let store =
        build_pipeline_store(&config.store).map_err(|err| ToolError::Runtime(err.to_string()))?;
    DiagnosticsReport::collect(&store, limit)
        .map_err(|err| ToolError::Runtime(err.to_string()))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
///
/// # Errors
///
/// Returns [`ToolError::Config`] when loading fails.
pub fn load_config(path: Option<&Path>) -> Result<WeatherLoaderConfig, ToolError> {
    WeatherLoaderConfig::load(path).map_err(|err| ToolError::Config(err.to_string()))
}
