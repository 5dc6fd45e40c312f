// crates/weather-loader-core/src/core/integrity.rs
// ============================================================================
// Module: Integrity Codec
// Description: Canonical form, HMAC-SHA256 signing, and checksum verification.
// Purpose: Authenticate measurement records with a shared secret.
// Dependencies: base64, hmac, sha2, subtle, thiserror
// ============================================================================

//! ## Overview
//! Records are authenticated by an HMAC-SHA256 over their canonical form
//! `Measurement|Location|Value|Timestamp`, encoded as standard padded base64.
//! `Value` is rendered with the shortest round-trip decimal form of an `f64`
//! (`0.4` stays `0.4`, `5.0` becomes `5`). Producers and the gateway must agree
//! on this rendering byte for byte.
//!
//! Security posture: checksum comparison is constant-time and the secret is
//! never rendered through `Debug`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::Hmac;
use hmac::Mac;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::core::record::MeasurementRecord;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HMAC-SHA256 keyed MAC.
type HmacSha256 = Hmac<Sha256>;

/// Shared secret used to sign and verify records.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Creates a secret from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true when the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<String> for SharedSecret {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

/// Integrity codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// The shared secret is empty.
    #[error("shared secret must not be empty")]
    EmptySecret,
    /// The MAC could not be keyed.
    #[error("invalid hmac key: {0}")]
    InvalidKey(String),
}

/// Detailed verification outcome used by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// Canonical string the signature covers.
    pub canonical: String,
    /// Checksum the secret produces for the canonical string.
    pub expected: String,
    /// Checksum supplied with the record, when present.
    pub supplied: Option<String>,
    /// True when the supplied checksum matches.
    pub valid: bool,
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Signs and verifies measurement records with a pre-keyed MAC.
#[derive(Clone)]
pub struct IntegrityCodec {
    /// MAC keyed with the shared secret; cloned per operation.
    mac: HmacSha256,
}

impl fmt::Debug for IntegrityCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrityCodec").finish_non_exhaustive()
    }
}

impl IntegrityCodec {
    /// Builds a codec for the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::EmptySecret`] for an empty secret.
    pub fn new(secret: &SharedSecret) -> Result<Self, IntegrityError> {
        if secret.is_empty() {
            return Err(IntegrityError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|err| IntegrityError::InvalidKey(err.to_string()))?;
        Ok(Self { mac })
    }

    /// Returns the canonical string of a record.
    #[must_use]
    pub fn canonicalize(record: &MeasurementRecord) -> String {
        canonicalize(record)
    }

    /// Returns the base64 checksum of a canonical string.
    #[must_use]
    pub fn sign(&self, canonical: &str) -> String {
        STANDARD.encode(self.digest(canonical))
    }

    /// Returns true when the record carries a checksum matching its contents.
    #[must_use]
    pub fn verify(&self, record: &MeasurementRecord) -> bool {
        let Some(supplied) = record.checksum.as_deref() else {
            return false;
        };
        let expected = self.sign(&canonicalize(record));
        expected.as_bytes().ct_eq(supplied.as_bytes()).into()
    }

    /// Returns the record with its checksum set from the current contents.
    #[must_use]
    pub fn seal(&self, record: MeasurementRecord) -> MeasurementRecord {
        let checksum = self.sign(&canonicalize(&record));
        record.with_checksum(checksum)
    }

    /// Returns the full verification breakdown for a record.
    #[must_use]
    pub fn inspect(&self, record: &MeasurementRecord) -> Verification {
        let canonical = canonicalize(record);
        let expected = self.sign(&canonical);
        let supplied = record.checksum.clone();
        let valid = supplied
            .as_deref()
            .is_some_and(|value| bool::from(expected.as_bytes().ct_eq(value.as_bytes())));
        Verification {
            canonical,
            expected,
            supplied,
            valid,
        }
    }

    /// Computes the raw MAC bytes for a canonical string.
    fn digest(&self, canonical: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

// ============================================================================
// SECTION: Free Functions
// ============================================================================

/// Returns `Measurement|Location|Value|Timestamp` for a record.
#[must_use]
pub fn canonicalize(record: &MeasurementRecord) -> String {
    format!("{}|{}|{}|{}", record.measurement, record.location, record.value, record.timestamp)
}

/// Signs a canonical string with a secret.
///
/// # Errors
///
/// Returns [`IntegrityError`] when the secret is unusable.
pub fn sign(canonical: &str, secret: &SharedSecret) -> Result<String, IntegrityError> {
    Ok(IntegrityCodec::new(secret)?.sign(canonical))
}

/// Verifies a record against a secret. An unusable secret never verifies.
#[must_use]
pub fn verify(record: &MeasurementRecord, secret: &SharedSecret) -> bool {
    IntegrityCodec::new(secret).is_ok_and(|codec| codec.verify(record))
}
