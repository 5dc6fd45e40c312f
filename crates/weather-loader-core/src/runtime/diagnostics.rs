// crates/weather-loader-core/src/runtime/diagnostics.rs
// ============================================================================
// Module: Pipeline Diagnostics
// Description: Read-only snapshots of queue, measurement, and dead-letter state.
// Purpose: Back the diagnostics endpoint and the CLI report command.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! Diagnostics never mutate the store. Each view lists the most recent rows
//! first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::DeadLetterEntry;
use crate::core::QueueEntry;
use crate::core::StoredMeasurement;
use crate::interfaces::PipelineStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Default number of rows per view.
pub const DEFAULT_REPORT_LIMIT: usize = 10;

/// Most-recent-N snapshot of the pipeline tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    /// Row limit applied to each view.
    pub limit: usize,
    /// Queue entries of any status.
    pub queue: Vec<QueueEntry>,
    /// Stored measurements.
    pub measurements: Vec<StoredMeasurement>,
    /// Dead-letter entries.
    pub dead_letters: Vec<DeadLetterEntry>,
}

impl DiagnosticsReport {
    /// Collects a snapshot from the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any view cannot be read.
    pub fn collect<S>(store: &S, limit: usize) -> Result<Self, StoreError>
    where
        S: PipelineStore + ?Sized,
    {
        Ok(Self {
            limit,
            queue: store.recent_entries(limit)?,
            measurements: store.recent_measurements(limit)?,
            dead_letters: store.recent_dead_letters(limit)?,
        })
    }
}
