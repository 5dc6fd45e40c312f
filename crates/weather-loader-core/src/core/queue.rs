// crates/weather-loader-core/src/core/queue.rs
// ============================================================================
// Module: Queue Entities
// Description: Queue entries, dead-letter entries, and stored measurements.
// Purpose: Define the durable state the pipeline moves records through.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A queue entry is created `NEW` by the gateway, becomes `PROCESSING` with
//! `attempts += 1` when a worker claims it, and then leaves the queue in
//! exactly one way: as a stored measurement, as a dead-letter entry, or back
//! to `NEW` for a later pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default character cap for dead-letter error messages.
pub const DEFAULT_MAX_ERROR_CHARS: usize = 255;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Store-assigned queue entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueEntryId(i64);

impl QueueEntryId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SECTION: Queue Entries
// ============================================================================

/// Queue entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Waiting to be claimed.
    New,
    /// Claimed by a worker.
    Processing,
}

impl QueueStatus {
    /// Returns the stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
        }
    }

    /// Parses a stored label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "NEW" => Some(Self::New),
            "PROCESSING" => Some(Self::Processing),
            _ => None,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry identifier.
    pub id: QueueEntryId,
    /// Current status.
    pub status: QueueStatus,
    /// Number of claims so far.
    pub attempts: u32,
    /// Enqueue time (unix millis).
    pub created_at: i64,
    /// Claim time (unix millis) while processing.
    pub locked_at: Option<i64>,
    /// Verified record JSON, opaque to the queue.
    pub payload: String,
}

/// Entry that exhausted its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Dead-letter identifier.
    pub id: i64,
    /// Original payload.
    pub payload: String,
    /// Last error, capped to the configured character count.
    pub error_message: String,
    /// Dead-letter time (unix millis).
    pub created_at: i64,
}

// ============================================================================
// SECTION: Measurements
// ============================================================================

/// Measurement row ready to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeasurement {
    /// Measurement tag.
    pub measurement: String,
    /// Location name.
    pub location: String,
    /// Measured value.
    pub value: f64,
    /// Normalized UTC instant.
    pub timestamp: String,
    /// Checksum carried through for audit.
    pub checksum: String,
}

/// Permanently stored measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeasurement {
    /// Row identifier.
    pub id: i64,
    /// Measurement tag.
    pub measurement: String,
    /// Location name.
    pub location: String,
    /// Measured value.
    pub value: f64,
    /// Normalized UTC instant.
    pub timestamp: String,
    /// Checksum carried through for audit.
    pub checksum: String,
    /// Insert time (unix millis).
    pub inserted_at: i64,
}

impl StoredMeasurement {
    /// Builds a stored row from an appended measurement.
    #[must_use]
    pub fn from_new(id: i64, measurement: NewMeasurement, inserted_at: i64) -> Self {
        Self {
            id,
            measurement: measurement.measurement,
            location: measurement.location,
            value: measurement.value,
            timestamp: measurement.timestamp,
            checksum: measurement.checksum,
            inserted_at,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Truncates a string to at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => value[.. index].to_string(),
        None => value.to_string(),
    }
}
