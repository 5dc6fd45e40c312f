// crates/weather-loader-core/src/core/envelope.rs
// ============================================================================
// Module: Base64 Envelope
// Description: Wrapping and unwrapping of records inside `{"DataBase64": ...}`.
// Purpose: Decode untrusted submissions into JSON objects with precise errors.
// Dependencies: base64, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Producers submit `{"DataBase64": "<base64 of record JSON>"}`. Decoding is a
//! three-stage check, each with its own error: the outer envelope shape, the
//! base64 payload, and the inner JSON object. Decoding accepts padded and
//! unpadded standard base64; encoding always emits padded output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine as _;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::GeneralPurpose;
use base64::engine::GeneralPurposeConfig;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Envelope field carrying the base64 payload.
pub const ENVELOPE_FIELD: &str = "DataBase64";

/// Standard-alphabet decoder tolerant of missing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outer submission envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64 of the record JSON.
    #[serde(rename = "DataBase64")]
    pub data_base64: String,
}

/// Envelope construction errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The payload could not be serialized.
    #[error("envelope payload serialization failed: {0}")]
    Serialize(String),
}

/// Envelope decode errors. Display strings are returned verbatim to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Body is not an object with a string `DataBase64` field.
    #[error("Invalid request. Expected {{ \"DataBase64\": \"...\" }}")]
    InvalidEnvelope,
    /// `DataBase64` is not valid base64.
    #[error("Invalid base64")]
    InvalidBase64,
    /// Decoded bytes are not a JSON object.
    #[error("Decoded base64 is not JSON")]
    InvalidJson,
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Serializes a payload and wraps it in an envelope.
///
/// # Errors
///
/// Returns [`EnvelopeError::Serialize`] when the payload cannot be serialized.
pub fn encode<T: Serialize>(payload: &T) -> Result<Envelope, EnvelopeError> {
    let bytes = serde_json::to_vec(payload).map_err(|err| EnvelopeError::Serialize(err.to_string()))?;
    Ok(Envelope {
        data_base64: STANDARD.encode(bytes),
    })
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes an already-parsed request body into the inner JSON object.
///
/// # Errors
///
/// Returns the [`DecodeError`] stage that failed.
pub fn decode(body: &Value) -> Result<Map<String, Value>, DecodeError> {
    let Some(Value::String(encoded)) = body.as_object().and_then(|object| object.get(ENVELOPE_FIELD))
    else {
        return Err(DecodeError::InvalidEnvelope);
    };
    decode_base64_record(encoded)
}

/// Accepts either an envelope or a bare record object.
///
/// Objects carrying `DataBase64` are unwrapped; any other object is returned
/// as-is.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidEnvelope`] for non-objects, or the stage that
/// failed while unwrapping an envelope.
pub fn decode_record_or_envelope(body: &Value) -> Result<Map<String, Value>, DecodeError> {
    match body {
        Value::Object(object) if object.contains_key(ENVELOPE_FIELD) => decode(body),
        Value::Object(object) => Ok(object.clone()),
        _ => Err(DecodeError::InvalidEnvelope),
    }
}

/// Decodes raw request bytes. Unparseable bodies are envelope errors.
///
/// # Errors
///
/// Returns the [`DecodeError`] stage that failed.
pub fn decode_bytes(body: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| DecodeError::InvalidEnvelope)?;
    decode(&value)
}

/// Decodes a base64 string into a JSON object.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidBase64`] or [`DecodeError::InvalidJson`].
pub fn decode_base64_record(encoded: &str) -> Result<Map<String, Value>, DecodeError> {
    let bytes = LENIENT.decode(encoded.trim()).map_err(|_| DecodeError::InvalidBase64)?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(object)) => Ok(object),
        _ => Err(DecodeError::InvalidJson),
    }
}
