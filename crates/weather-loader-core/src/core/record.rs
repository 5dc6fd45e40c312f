// crates/weather-loader-core/src/core/record.rs
// ============================================================================
// Module: Measurement Record
// Description: Wire-level measurement record and field validation.
// Purpose: Provide the signed record exchanged between producers and the gateway.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`MeasurementRecord`] is the JSON object a producer signs and submits:
//! `{Measurement, Location, Value, Timestamp, Checksum}`. Field names and
//! casing are part of the wire contract. Records decoded from untrusted input
//! go through [`MeasurementRecord::from_json_object`], which reports the first
//! absent field in wire order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire name of the measurement tag field.
pub const FIELD_MEASUREMENT: &str = "Measurement";
/// Wire name of the location field.
pub const FIELD_LOCATION: &str = "Location";
/// Wire name of the value field.
pub const FIELD_VALUE: &str = "Value";
/// Wire name of the timestamp field.
pub const FIELD_TIMESTAMP: &str = "Timestamp";
/// Wire name of the checksum field.
pub const FIELD_CHECKSUM: &str = "Checksum";

/// Fields every submitted record must carry, in validation order.
pub const REQUIRED_FIELDS: [&str; 5] =
    [FIELD_MEASUREMENT, FIELD_LOCATION, FIELD_VALUE, FIELD_TIMESTAMP, FIELD_CHECKSUM];

// ============================================================================
// SECTION: Record
// ============================================================================

/// Signed measurement record as exchanged on the wire.
///
/// # Invariants
/// - `timestamp` is kept exactly as supplied; it is never reformatted here.
/// - `value` is finite when produced by [`MeasurementRecord::from_json_object`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasurementRecord {
    /// Measurement tag (for example `temperature`).
    pub measurement: String,
    /// Location name.
    pub location: String,
    /// Measured value.
    pub value: f64,
    /// ISO-8601 instant as supplied by the producer.
    pub timestamp: String,
    /// Base64 HMAC signature over the canonical form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl MeasurementRecord {
    /// Creates an unsigned record.
    #[must_use]
    pub fn unsigned(
        measurement: impl Into<String>,
        location: impl Into<String>,
        value: f64,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            location: location.into(),
            value,
            timestamp: timestamp.into(),
            checksum: None,
        }
    }

    /// Returns a copy of the record carrying the given checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Builds a record from a decoded JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingField`] naming the first absent field in
    /// [`REQUIRED_FIELDS`] order, or [`RecordError::InvalidField`] when a field
    /// has the wrong JSON type. A `null` checksum is present but unsigned, so
    /// the record parses and later fails verification.
    pub fn from_json_object(object: &Map<String, Value>) -> Result<Self, RecordError> {
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|field| !object.contains_key(**field))
        {
            return Err(RecordError::MissingField(missing));
        }
        Ok(Self {
            measurement: string_field(object, FIELD_MEASUREMENT)?,
            location: string_field(object, FIELD_LOCATION)?,
            value: number_field(object, FIELD_VALUE)?,
            timestamp: string_field(object, FIELD_TIMESTAMP)?,
            checksum: checksum_field(object)?,
        })
    }

    /// Parses a record from serialized JSON text (for example a queue payload).
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidJson`] when the text is not a JSON object,
    /// otherwise the errors of [`MeasurementRecord::from_json_object`].
    pub fn from_json_str(text: &str) -> Result<Self, RecordError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| RecordError::InvalidJson(err.to_string()))?;
        let Value::Object(object) = value else {
            return Err(RecordError::InvalidJson("payload is not a JSON object".to_string()));
        };
        Self::from_json_object(&object)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A required field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    /// A field is present with an unusable type or value.
    #[error("Invalid field: {field} ({reason})")]
    InvalidField {
        /// Wire name of the offending field.
        field: &'static str,
        /// Short reason label.
        reason: &'static str,
    },
    /// The record text is not a JSON object.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts a string field.
fn string_field(object: &Map<String, Value>, field: &'static str) -> Result<String, RecordError> {
    match object.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(RecordError::InvalidField {
            field,
            reason: "expected string",
        }),
        None => Err(RecordError::MissingField(field)),
    }
}

/// Extracts the checksum, reading `null` as no checksum.
fn checksum_field(object: &Map<String, Value>) -> Result<Option<String>, RecordError> {
    match object.get(FIELD_CHECKSUM) {
        Some(Value::Null) => Ok(None),
        _ => string_field(object, FIELD_CHECKSUM).map(Some),
    }
}

/// Extracts a finite numeric field.
fn number_field(object: &Map<String, Value>, field: &'static str) -> Result<f64, RecordError> {
    match object.get(field) {
        Some(Value::Number(number)) => match number.as_f64() {
            Some(value) if value.is_finite() => Ok(value),
            _ => Err(RecordError::InvalidField {
                field,
                reason: "expected finite number",
            }),
        },
        Some(_) => Err(RecordError::InvalidField {
            field,
            reason: "expected number",
        }),
        None => Err(RecordError::MissingField(field)),
    }
}
