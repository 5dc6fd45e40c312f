// crates/weather-loader-core/src/core/time.rs
// ============================================================================
// Module: Time Helpers
// Description: Timestamp normalization and wall-clock helpers.
// Purpose: Convert producer timestamps into fixed-precision UTC instants.
// Dependencies: time, thiserror
// ============================================================================

//! ## Overview
//! Producers send ISO-8601 instants in several shapes (`2025-12-28T17:00Z`,
//! `2025-01-10T12:00:00.250+01:00`, ...). Stored measurements use a single
//! fixed-precision UTC form, `YYYY-MM-DD HH:MM:SS.ffffff`. Inputs without an
//! explicit offset are taken as UTC.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use thiserror::Error;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Iso8601;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Layouts
// ============================================================================

/// Offset-less layouts tried after the well-known formats.
const LOCAL_LAYOUTS: [&[BorrowedFormatItem<'static>]; 6] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

/// Layouts carrying an explicit numeric offset.
const OFFSET_LAYOUTS: [&[BorrowedFormatItem<'static>]; 3] = [
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!("[year]-[month]-[day]T[hour]:[minute][offset_hour sign:mandatory]:[offset_minute]"),
];

/// Stored measurement form, `YYYY-MM-DD HH:MM:SS.ffffff`.
const STORED_LAYOUT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// Minute-precision producer form, `YYYY-MM-DDTHH:MM`.
const MINUTE_LAYOUT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp normalization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The input is not a recognizable ISO-8601 instant.
    #[error("invalid timestamp: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes an ISO-8601 instant to `YYYY-MM-DD HH:MM:SS.ffffff` in UTC.
///
/// # Errors
///
/// Returns [`TimestampError::Invalid`] when the input cannot be parsed.
pub fn normalize_timestamp(raw: &str) -> Result<String, TimestampError> {
    let instant = parse_instant(raw.trim())
        .ok_or_else(|| TimestampError::Invalid(raw.to_string()))?
        .to_offset(UtcOffset::UTC);
    instant.format(STORED_LAYOUT).map_err(|_| TimestampError::Invalid(raw.to_string()))
}

/// Parses an instant, trying well-known formats before the fallback layouts.
fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }
    if let Ok(value) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
        return Some(value);
    }
    if let Some(value) =
        OFFSET_LAYOUTS.iter().find_map(|layout| OffsetDateTime::parse(raw, layout).ok())
    {
        return Some(value);
    }
    let local = raw.strip_suffix(['Z', 'z']).unwrap_or(raw);
    LOCAL_LAYOUTS
        .iter()
        .find_map(|layout| PrimitiveDateTime::parse(local, layout).ok())
        .map(PrimitiveDateTime::assume_utc)
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Returns the current unix timestamp in milliseconds.
#[must_use]
pub fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Returns the current UTC instant at minute precision, `YYYY-MM-DDTHH:MM`.
#[must_use]
pub fn utc_minute_now() -> String {
    OffsetDateTime::now_utc().format(MINUTE_LAYOUT).unwrap_or_default()
}
