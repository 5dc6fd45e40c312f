// crates/weather-loader-core/src/core/mod.rs
// ============================================================================
// Module: Weather Loader Core Types
// Description: Records, codecs, queue entities, and time helpers.
// Purpose: Group the data model and wire-level codecs of the pipeline.
// Dependencies: crate::core::{envelope, integrity, queue, record, time}
// ============================================================================

//! ## Overview
//! Data model and wire codecs shared by the gateway, the worker, and the
//! stores. Nothing here performs I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod envelope;
pub mod integrity;
pub mod queue;
pub mod record;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::envelope::DecodeError;
pub use self::envelope::ENVELOPE_FIELD;
pub use self::envelope::Envelope;
pub use self::envelope::EnvelopeError;
pub use self::envelope::decode_record_or_envelope;
pub use self::integrity::IntegrityCodec;
pub use self::integrity::IntegrityError;
pub use self::integrity::SharedSecret;
pub use self::integrity::Verification;
pub use self::queue::DEFAULT_MAX_ERROR_CHARS;
pub use self::queue::DeadLetterEntry;
pub use self::queue::NewMeasurement;
pub use self::queue::QueueEntry;
pub use self::queue::QueueEntryId;
pub use self::queue::QueueStatus;
pub use self::queue::StoredMeasurement;
pub use self::queue::truncate_chars;
pub use self::record::MeasurementRecord;
pub use self::record::REQUIRED_FIELDS;
pub use self::record::RecordError;
pub use self::time::TimestampError;
pub use self::time::normalize_timestamp;
pub use self::time::unix_millis;
pub use self::time::utc_minute_now;
