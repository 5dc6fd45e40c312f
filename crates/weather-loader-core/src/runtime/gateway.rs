// crates/weather-loader-core/src/runtime/gateway.rs
// ============================================================================
// Module: Ingestion Gateway
// Description: Envelope decoding, field checks, and integrity verification.
// Purpose: Admit only authenticated records into the durable queue.
// Dependencies: crate::{core, interfaces}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The gateway is the only trust boundary of the pipeline. A submission is
//! decoded, checked for the five record fields, verified against the shared
//! secret, and only then enqueued. Every rejection path leaves the store
//! untouched; an accepted call performs exactly one insert.
//!
//! Security posture: inputs are untrusted; checksum failures are reported as
//! [`Rejection::Authentication`] so callers can audit them separately.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::DecodeError;
use crate::core::IntegrityCodec;
use crate::core::MeasurementRecord;
use crate::core::QueueEntry;
use crate::core::RecordError;
use crate::core::envelope;
use crate::interfaces::QueueStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    /// Newly created queue entry.
    pub entry: QueueEntry,
    /// Verified record.
    pub record: MeasurementRecord,
}

/// Rejected submission. Display strings are safe to return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Envelope, base64, or inner JSON is malformed.
    #[error("{0}")]
    Decode(#[from] DecodeError),
    /// A required record field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    /// A record field has the wrong JSON type.
    #[error("Invalid field: {field}")]
    InvalidField {
        /// Wire name of the offending field.
        field: &'static str,
        /// Short reason label.
        reason: &'static str,
    },
    /// Checksum verification failed.
    #[error("Checksum invalid")]
    Authentication,
    /// The queue insert failed.
    #[error("DB error")]
    Store(StoreError),
}

impl Rejection {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::MissingField(_) => "missing_field",
            Self::InvalidField {
                ..
            } => "invalid_field",
            Self::Authentication => "authentication",
            Self::Store(_) => "store",
        }
    }

    /// Returns true when the rejection was caused by the caller.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl From<RecordError> for Rejection {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::MissingField(field) => Self::MissingField(field),
            RecordError::InvalidField {
                field,
                reason,
            } => Self::InvalidField {
                field,
                reason,
            },
            RecordError::InvalidJson(_) => Self::Decode(DecodeError::InvalidJson),
        }
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Verifying front door of the queue.
#[derive(Debug, Clone)]
pub struct IngestionGateway<S> {
    /// Integrity codec keyed with the shared secret.
    codec: IntegrityCodec,
    /// Queue the gateway writes to.
    store: S,
}

impl<S> IngestionGateway<S>
where
    S: QueueStore,
{
    /// Creates a gateway over the given queue.
    #[must_use]
    pub const fn new(codec: IntegrityCodec, store: S) -> Self {
        Self {
            codec,
            store,
        }
    }

    /// Returns the integrity codec.
    #[must_use]
    pub const fn codec(&self) -> &IntegrityCodec {
        &self.codec
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Accepts a parsed envelope body.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection`] for malformed, incomplete, unauthenticated, or
    /// unstorable submissions.
    pub fn accept(&self, body: &Value) -> Result<Accepted, Rejection> {
        let object = envelope::decode(body)?;
        self.admit(object)
    }

    /// Accepts a raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection`] for malformed, incomplete, unauthenticated, or
    /// unstorable submissions.
    pub fn accept_bytes(&self, body: &[u8]) -> Result<Accepted, Rejection> {
        let object = envelope::decode_bytes(body)?;
        self.admit(object)
    }

    /// Validates and enqueues a decoded record object.
    fn admit(&self, object: Map<String, Value>) -> Result<Accepted, Rejection> {
        let record = MeasurementRecord::from_json_object(&object)?;
        if !self.codec.verify(&record) {
            return Err(Rejection::Authentication);
        }
        let payload = serde_json::to_string(&Value::Object(object))
            .map_err(|_| Rejection::Decode(DecodeError::InvalidJson))?;
        let entry = self.store.enqueue(&payload).map_err(Rejection::Store)?;
        Ok(Accepted {
            entry,
            record,
        })
    }
}
