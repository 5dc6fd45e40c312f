// crates/weather-loader-core/src/interfaces/mod.rs
// ============================================================================
// Module: Weather Loader Interfaces
// Description: Backend-agnostic storage interfaces for the pipeline.
// Purpose: Define the durable queue, measurement, and dead-letter contracts.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The pipeline reaches persistence only through these traits. The queue
//! contract carries the one synchronization point of the system: `claim` is a
//! compare-and-set on status, so concurrent workers never process the same
//! entry in the same pass. `complete` and `dead_letter` move an entry out of
//! the queue in a single atomic step.
//!
//! Security posture: payloads reaching a store have already passed integrity
//! verification; stores must still treat them as opaque text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::queue::DeadLetterEntry;
use crate::core::queue::NewMeasurement;
use crate::core::queue::QueueEntry;
use crate::core::queue::QueueEntryId;
use crate::core::queue::StoredMeasurement;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Store errors shared by all pipeline stores.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("pipeline store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("pipeline store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("pipeline store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data or request is invalid.
    #[error("pipeline store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("pipeline store error: {0}")]
    Store(String),
    /// Store is temporarily unavailable (busy or locked).
    #[error("pipeline store unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Queue Store
// ============================================================================

/// Durable work queue.
pub trait QueueStore {
    /// Inserts a new entry with status `NEW` and zero attempts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn enqueue(&self, payload: &str) -> Result<QueueEntry, StoreError>;

    /// Lists up to `limit` `NEW` entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn pending(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError>;

    /// Atomically moves a `NEW` entry to `PROCESSING`, increments its
    /// attempts, and returns the updated entry. Returns `None` when the entry
    /// is gone or no longer `NEW`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn claim(&self, id: QueueEntryId, locked_at: i64) -> Result<Option<QueueEntry>, StoreError>;

    /// Returns a `PROCESSING` entry to `NEW` and clears its lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn release(&self, id: QueueEntryId) -> Result<bool, StoreError>;

    /// Appends the measurement and deletes the `PROCESSING` entry in one
    /// atomic step. Nothing is written when the entry is not `PROCESSING`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when either write fails or the entry is missing.
    fn complete(
        &self,
        id: QueueEntryId,
        measurement: &NewMeasurement,
    ) -> Result<StoredMeasurement, StoreError>;

    /// Writes a dead-letter entry and deletes the `PROCESSING` entry in one
    /// atomic step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when either write fails or the entry is missing.
    fn dead_letter(
        &self,
        id: QueueEntryId,
        payload: &str,
        error_message: &str,
    ) -> Result<DeadLetterEntry, StoreError>;

    /// Returns `PROCESSING` entries locked before `locked_before` to `NEW`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn reclaim_stale(&self, locked_before: i64) -> Result<usize, StoreError>;

    /// Loads an entry by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, StoreError>;

    /// Lists up to `limit` entries of any status, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn recent_entries(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Measurement Store
// ============================================================================

/// Append-only measurement storage.
pub trait MeasurementStore {
    /// Appends a measurement outside of the queue flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn append(&self, measurement: &NewMeasurement) -> Result<StoredMeasurement, StoreError>;

    /// Lists up to `limit` measurements, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn recent_measurements(&self, limit: usize) -> Result<Vec<StoredMeasurement>, StoreError>;
}

// ============================================================================
// SECTION: Dead-Letter Store
// ============================================================================

/// Read access to dead-lettered entries.
pub trait DeadLetterStore {
    /// Lists up to `limit` dead-letter entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn recent_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError>;
}

// ============================================================================
// SECTION: Pipeline Store
// ============================================================================

/// Combined store used by the gateway, worker, and diagnostics.
pub trait PipelineStore: QueueStore + MeasurementStore + DeadLetterStore {}

impl<T> PipelineStore for T where T: QueueStore + MeasurementStore + DeadLetterStore {}
