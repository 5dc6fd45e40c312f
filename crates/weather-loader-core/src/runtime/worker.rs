// crates/weather-loader-core/src/runtime/worker.rs
// ============================================================================
// Module: Queue Worker
// Description: Batch processing of queued records with bounded retries.
// Purpose: Move verified records from the queue into permanent storage.
// Dependencies: crate::{core, interfaces}, serde, thiserror
// ============================================================================

//! ## Overview
//! [`Worker::run_batch`] is one finite pass over the queue. Each `NEW` entry is
//! claimed with a compare-and-set, converted into a measurement row, and then
//! resolved in exactly one way: stored, returned to `NEW` for a later pass, or
//! dead-lettered once its attempts reach the ceiling. A failing entry never
//! halts the pass.
//!
//! Entries left `PROCESSING` by a killed worker stay there unless a stale-lock
//! window is configured, in which case the pass first returns them to `NEW`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::DEFAULT_MAX_ERROR_CHARS;
use crate::core::MeasurementRecord;
use crate::core::NewMeasurement;
use crate::core::QueueEntry;
use crate::core::QueueEntryId;
use crate::core::RecordError;
use crate::core::TimestampError;
use crate::core::normalize_timestamp;
use crate::core::truncate_chars;
use crate::core::unix_millis;
use crate::interfaces::QueueStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default number of entries examined per pass.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Default attempt ceiling before dead-lettering.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Worker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum `NEW` entries examined per pass.
    pub batch_size: usize,
    /// Attempts after which a failing entry is dead-lettered.
    pub max_attempts: u32,
    /// Character cap for dead-letter error messages.
    pub max_error_chars: usize,
    /// Optional lock age (millis) after which `PROCESSING` entries are reclaimed.
    pub stale_lock_ms: Option<i64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_error_chars: DEFAULT_MAX_ERROR_CHARS,
            stale_lock_ms: None,
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Resolution of a single queue entry within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Stored as a measurement and removed from the queue.
    Stored {
        /// Identifier of the stored measurement.
        measurement_id: i64,
    },
    /// Returned to `NEW` for a later pass.
    Retry {
        /// Processing error.
        error: String,
    },
    /// Moved to the dead-letter table.
    DeadLetter {
        /// Processing error as recorded.
        error: String,
    },
    /// Claimed by another worker, reset by another pass, or no longer present.
    Skipped,
    /// The entry could not be resolved and stays `PROCESSING`.
    Failed {
        /// Store error.
        error: String,
    },
}

impl EntryOutcome {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stored {
                ..
            } => "stored",
            Self::Retry {
                ..
            } => "retry",
            Self::DeadLetter {
                ..
            } => "dead_letter",
            Self::Skipped => "skipped",
            Self::Failed {
                ..
            } => "failed",
        }
    }
}

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// `NEW` entries selected for the pass.
    pub found: usize,
    /// Entries stored as measurements.
    pub processed: usize,
    /// Entries returned to `NEW`.
    pub retried: usize,
    /// Entries moved to the dead-letter table.
    pub dead_lettered: usize,
    /// Entries another worker claimed first.
    pub skipped: usize,
    /// Entries that could not be resolved.
    pub failed: usize,
    /// Stale `PROCESSING` entries returned to `NEW` before the pass.
    pub reclaimed: usize,
}

impl BatchSummary {
    /// Counts one entry outcome.
    fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Stored {
                ..
            } => self.processed += 1,
            EntryOutcome::Retry {
                ..
            } => self.retried += 1,
            EntryOutcome::DeadLetter {
                ..
            } => self.dead_lettered += 1,
            EntryOutcome::Skipped => self.skipped += 1,
            EntryOutcome::Failed {
                ..
            } => self.failed += 1,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure converting or storing a claimed entry. Consumes retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    /// The payload no longer decodes into a complete record.
    #[error("{0}")]
    Payload(#[from] RecordError),
    /// The timestamp cannot be normalized.
    #[error("{0}")]
    Timestamp(#[from] TimestampError),
    /// The measurement write failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// Pass-level failure; entry-level failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// Selecting or reclaiming entries failed.
    #[error("worker store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Receives per-entry and per-pass notifications.
pub trait WorkerObserver {
    /// Called once per examined entry.
    fn on_entry(&self, id: QueueEntryId, attempts: u32, outcome: &EntryOutcome) {
        let _ = (id, attempts, outcome);
    }

    /// Called once at the end of a pass.
    fn on_batch(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// Observer that ignores all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWorkerObserver;

impl WorkerObserver for NoopWorkerObserver {}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Batch processor over a queue store.
#[derive(Clone)]
pub struct Worker<S> {
    /// Store holding the queue, measurement, and dead-letter tables.
    store: S,
    /// Worker tuning.
    config: WorkerConfig,
    /// Outcome observer.
    observer: Arc<dyn WorkerObserver + Send + Sync>,
}

impl<S> Worker<S>
where
    S: QueueStore,
{
    /// Creates a worker with a no-op observer.
    #[must_use]
    pub fn new(store: S, config: WorkerConfig) -> Self {
        Self {
            store,
            config,
            observer: Arc::new(NoopWorkerObserver),
        }
    }

    /// Replaces the outcome observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn WorkerObserver + Send + Sync>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the worker configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs one pass over up to `batch_size` `NEW` entries.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] only when entries cannot be selected; failures
    /// of individual entries are counted in the summary.
    pub fn run_batch(&self) -> Result<BatchSummary, WorkerError> {
        let mut summary = BatchSummary::default();
        if let Some(stale_ms) = self.config.stale_lock_ms {
            let cutoff = unix_millis().saturating_sub(stale_ms);
            summary.reclaimed = self.store.reclaim_stale(cutoff)?;
        }
        let entries = self.store.pending(self.config.batch_size)?;
        summary.found = entries.len();
        for entry in entries {
            let (attempts, outcome) = self.process_entry(&entry);
            summary.record(&outcome);
            self.observer.on_entry(entry.id, attempts, &outcome);
        }
        self.observer.on_batch(&summary);
        Ok(summary)
    }

    /// Claims and resolves one entry, returning its attempts and outcome.
    fn process_entry(&self, entry: &QueueEntry) -> (u32, EntryOutcome) {
        let claimed = match self.store.claim(entry.id, unix_millis()) {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return (entry.attempts, EntryOutcome::Skipped),
            Err(err) => {
                return (
                    entry.attempts,
                    EntryOutcome::Failed {
                        error: err.to_string(),
                    },
                );
            }
        };
        let result = convert(&claimed).and_then(|measurement| {
            self.store.complete(claimed.id, &measurement).map_err(ProcessingError::from)
        });
        let outcome = match result {
            Ok(stored) => EntryOutcome::Stored {
                measurement_id: stored.id,
            },
            Err(err) => self.resolve_failure(&claimed, &err),
        };
        (claimed.attempts, outcome)
    }

    /// Retries or dead-letters a claimed entry after a processing failure.
    fn resolve_failure(&self, claimed: &QueueEntry, error: &ProcessingError) -> EntryOutcome {
        let message = error.to_string();
        if claimed.attempts >= self.config.max_attempts {
            let recorded = truncate_chars(&message, self.config.max_error_chars);
            return match self.store.dead_letter(claimed.id, &claimed.payload, &recorded) {
                Ok(_) => EntryOutcome::DeadLetter {
                    error: recorded,
                },
                Err(err) => self.release_after(claimed.id, &err),
            };
        }
        match self.store.release(claimed.id) {
            Ok(true) => EntryOutcome::Retry {
                error: message,
            },
            Ok(false) => EntryOutcome::Skipped,
            Err(err) => EntryOutcome::Failed {
                error: err.to_string(),
            },
        }
    }

    /// Returns an entry to `NEW` after its dead-letter write failed.
    ///
    /// A release that finds the entry no longer `PROCESSING` means another
    /// pass already took it back, so the entry counts as skipped.
    fn release_after(&self, id: QueueEntryId, cause: &StoreError) -> EntryOutcome {
        match self.store.release(id) {
            Ok(true) => EntryOutcome::Retry {
                error: cause.to_string(),
            },
            Ok(false) => EntryOutcome::Skipped,
            Err(err) => EntryOutcome::Failed {
                error: err.to_string(),
            },
        }
    }
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Converts a claimed payload into a measurement row.
fn convert(entry: &QueueEntry) -> Result<NewMeasurement, ProcessingError> {
    let record = MeasurementRecord::from_json_str(&entry.payload)?;
    let timestamp = normalize_timestamp(&record.timestamp)?;
    Ok(NewMeasurement {
        measurement: record.measurement,
        location: record.location,
        value: record.value,
        timestamp,
        checksum: record.checksum.unwrap_or_default(),
    })
}
