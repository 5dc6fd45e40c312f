// crates/weather-loader-core/tests/envelope.rs
// ============================================================================
// Module: Envelope Codec Tests
// Description: Verifies base64 envelope decoding stages and error messages.
// ============================================================================
//! ## Overview
//! Each decode stage fails with its own client-facing message; encoded records
//! decode back to the same fields.

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

use proptest::prelude::*;
use serde_json::json;
use weather_loader_core::DecodeError;
use weather_loader_core::MeasurementRecord;
use weather_loader_core::envelope;

#[test]
fn decode_returns_inner_object() {
    let body = json!({"DataBase64": "eyJNZWFzdXJlbWVudCI6InRlbXBlcmF0dXJlIn0="});
    let object = envelope::decode(&body).unwrap();
    assert_eq!(object.get("Measurement"), Some(&json!("temperature")));
}

#[test]
fn decode_accepts_unpadded_base64() {
    let body = json!({"DataBase64": "eyJNZWFzdXJlbWVudCI6InRlbXBlcmF0dXJlIn0"});
    assert!(envelope::decode(&body).is_ok());
}

#[test]
fn missing_or_non_string_field_is_invalid_envelope() {
    for body in [json!({}), json!({"DataBase64": 7}), json!([]), json!("DataBase64")] {
        assert_eq!(envelope::decode(&body).unwrap_err(), DecodeError::InvalidEnvelope);
    }
}

#[test]
fn malformed_outer_json_is_invalid_envelope() {
    assert_eq!(envelope::decode_bytes(b"{not json").unwrap_err(), DecodeError::InvalidEnvelope);
}

#[test]
fn bad_base64_is_reported() {
    let body = json!({"DataBase64": "***"});
    assert_eq!(envelope::decode(&body).unwrap_err(), DecodeError::InvalidBase64);
}

#[test]
fn non_object_payloads_are_not_json() {
    for encoded in ["bm90IGpzb24=", "WzEsMl0="] {
        let body = json!({"DataBase64": encoded});
        assert_eq!(envelope::decode(&body).unwrap_err(), DecodeError::InvalidJson);
    }
}

#[test]
fn decode_error_messages_match_client_contract() {
    assert_eq!(
        DecodeError::InvalidEnvelope.to_string(),
        "Invalid request. Expected { \"DataBase64\": \"...\" }"
    );
    assert_eq!(DecodeError::InvalidBase64.to_string(), "Invalid base64");
    assert_eq!(DecodeError::InvalidJson.to_string(), "Decoded base64 is not JSON");
}

#[test]
fn envelope_serializes_with_wire_field_name() {
    let record = MeasurementRecord::unsigned("temperature", "Cieszyn", 0.4, "2025-12-28T17:00Z");
    let wrapped = envelope::encode(&record).unwrap();
    let value = serde_json::to_value(&wrapped).unwrap();
    assert!(value.get("DataBase64").and_then(|field| field.as_str()).is_some());
}

proptest! {
    #[test]
    fn encoded_records_decode_to_the_same_fields(
        location in "[A-Za-z\\u{0104}-\\u{017c} ]{1,20}",
        tenths in -600i32..600,
        checksum in "[A-Za-z0-9+/]{43}=",
    ) {
        let value = f64::from(tenths) / 10.0;
        let record = MeasurementRecord::unsigned("temperature", location, value, "2025-12-28T17:00Z")
            .with_checksum(checksum);
        let wrapped = envelope::encode(&record).unwrap();
        let body = serde_json::to_vec(&wrapped).unwrap();
        let object = envelope::decode_bytes(&body).unwrap();
        prop_assert_eq!(MeasurementRecord::from_json_object(&object).unwrap(), record);
    }
}
