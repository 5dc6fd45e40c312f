// crates/weather-loader-core/src/runtime/store.rs
// ============================================================================
// Module: Weather Loader In-Memory Store
// Description: In-memory pipeline store and shared store wrapper.
// Purpose: Provide a deterministic store for tests and local demos.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryPipelineStore`] keeps the queue, measurement, and dead-letter
//! tables behind one mutex, so every trait operation is atomic with respect to
//! the others. It is not durable. [`SharedPipelineStore`] wraps any store in a
//! clonable `Arc` trait object for the server and worker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::DeadLetterEntry;
use crate::core::NewMeasurement;
use crate::core::QueueEntry;
use crate::core::QueueEntryId;
use crate::core::QueueStatus;
use crate::core::StoredMeasurement;
use crate::core::unix_millis;
use crate::interfaces::DeadLetterStore;
use crate::interfaces::MeasurementStore;
use crate::interfaces::PipelineStore;
use crate::interfaces::QueueStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Tables held by the in-memory store.
#[derive(Debug, Default)]
struct Tables {
    /// Last assigned queue identifier.
    next_queue_id: i64,
    /// Last assigned measurement identifier.
    next_measurement_id: i64,
    /// Last assigned dead-letter identifier.
    next_dead_letter_id: i64,
    /// Queue entries keyed by identifier.
    queue: BTreeMap<QueueEntryId, QueueEntry>,
    /// Stored measurements in insert order.
    measurements: Vec<StoredMeasurement>,
    /// Dead-letter entries in insert order.
    dead_letters: Vec<DeadLetterEntry>,
}

impl Tables {
    /// Removes a `PROCESSING` entry or reports why it cannot be removed.
    fn take_processing(&mut self, id: QueueEntryId) -> Result<QueueEntry, StoreError> {
        match self.queue.get(&id) {
            Some(entry) if entry.status == QueueStatus::Processing => {
                self.queue.remove(&id).ok_or_else(|| missing_entry(id))
            }
            Some(_) => Err(StoreError::Invalid(format!("queue entry {id} is not processing"))),
            None => Err(missing_entry(id)),
        }
    }

    /// Appends a measurement row.
    fn push_measurement(&mut self, measurement: &NewMeasurement) -> StoredMeasurement {
        self.next_measurement_id += 1;
        let stored =
            StoredMeasurement::from_new(self.next_measurement_id, measurement.clone(), unix_millis());
        self.measurements.push(stored.clone());
        stored
    }
}

/// In-memory pipeline store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPipelineStore {
    /// Tables protected by a mutex.
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPipelineStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the tables.
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Store("pipeline store mutex poisoned".to_string()))
    }
}

impl QueueStore for InMemoryPipelineStore {
    fn enqueue(&self, payload: &str) -> Result<QueueEntry, StoreError> {
        let mut tables = self.lock()?;
        tables.next_queue_id += 1;
        let entry = QueueEntry {
            id: QueueEntryId::new(tables.next_queue_id),
            status: QueueStatus::New,
            attempts: 0,
            created_at: unix_millis(),
            locked_at: None,
            payload: payload.to_string(),
        };
        tables.queue.insert(entry.id, entry.clone());
        drop(tables);
        Ok(entry)
    }

    fn pending(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .queue
            .values()
            .filter(|entry| entry.status == QueueStatus::New)
            .take(limit)
            .cloned()
            .collect())
    }

    fn claim(&self, id: QueueEntryId, locked_at: i64) -> Result<Option<QueueEntry>, StoreError> {
        let mut tables = self.lock()?;
        let Some(entry) = tables.queue.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != QueueStatus::New {
            return Ok(None);
        }
        entry.status = QueueStatus::Processing;
        entry.attempts = entry.attempts.saturating_add(1);
        entry.locked_at = Some(locked_at);
        Ok(Some(entry.clone()))
    }

    fn release(&self, id: QueueEntryId) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        match tables.queue.get_mut(&id) {
            Some(entry) if entry.status == QueueStatus::Processing => {
                entry.status = QueueStatus::New;
                entry.locked_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn complete(
        &self,
        id: QueueEntryId,
        measurement: &NewMeasurement,
    ) -> Result<StoredMeasurement, StoreError> {
        let mut tables = self.lock()?;
        tables.take_processing(id)?;
        Ok(tables.push_measurement(measurement))
    }

    fn dead_letter(
        &self,
        id: QueueEntryId,
        payload: &str,
        error_message: &str,
    ) -> Result<DeadLetterEntry, StoreError> {
        let mut tables = self.lock()?;
        tables.take_processing(id)?;
        tables.next_dead_letter_id += 1;
        let entry = DeadLetterEntry {
            id: tables.next_dead_letter_id,
            payload: payload.to_string(),
            error_message: error_message.to_string(),
            created_at: unix_millis(),
        };
        tables.dead_letters.push(entry.clone());
        drop(tables);
        Ok(entry)
    }

    fn reclaim_stale(&self, locked_before: i64) -> Result<usize, StoreError> {
        let mut tables = self.lock()?;
        let mut reclaimed = 0;
        for entry in tables.queue.values_mut() {
            if entry.status == QueueStatus::Processing
                && entry.locked_at.is_some_and(|locked_at| locked_at < locked_before)
            {
                entry.status = QueueStatus::New;
                entry.locked_at = None;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    fn get(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.lock()?.queue.get(&id).cloned())
    }

    fn recent_entries(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.queue.values().rev().take(limit).cloned().collect())
    }
}

impl MeasurementStore for InMemoryPipelineStore {
    fn append(&self, measurement: &NewMeasurement) -> Result<StoredMeasurement, StoreError> {
        Ok(self.lock()?.push_measurement(measurement))
    }

    fn recent_measurements(&self, limit: usize) -> Result<Vec<StoredMeasurement>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.measurements.iter().rev().take(limit).cloned().collect())
    }
}

impl DeadLetterStore for InMemoryPipelineStore {
    fn recent_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.dead_letters.iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared pipeline store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedPipelineStore {
    /// Inner store implementation.
    inner: Arc<dyn PipelineStore + Send + Sync>,
}

impl SharedPipelineStore {
    /// Wraps a pipeline store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl PipelineStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn PipelineStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl QueueStore for SharedPipelineStore {
    fn enqueue(&self, payload: &str) -> Result<QueueEntry, StoreError> {
        self.inner.enqueue(payload)
    }

    fn pending(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError> {
        self.inner.pending(limit)
    }

    fn claim(&self, id: QueueEntryId, locked_at: i64) -> Result<Option<QueueEntry>, StoreError> {
        self.inner.claim(id, locked_at)
    }

    fn release(&self, id: QueueEntryId) -> Result<bool, StoreError> {
        self.inner.release(id)
    }

    fn complete(
        &self,
        id: QueueEntryId,
        measurement: &NewMeasurement,
    ) -> Result<StoredMeasurement, StoreError> {
        self.inner.complete(id, measurement)
    }

    fn dead_letter(
        &self,
        id: QueueEntryId,
        payload: &str,
        error_message: &str,
    ) -> Result<DeadLetterEntry, StoreError> {
        self.inner.dead_letter(id, payload, error_message)
    }

    fn reclaim_stale(&self, locked_before: i64) -> Result<usize, StoreError> {
        self.inner.reclaim_stale(locked_before)
    }

    fn get(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, StoreError> {
        self.inner.get(id)
    }

    fn recent_entries(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError> {
        self.inner.recent_entries(limit)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.inner.readiness()
    }
}

impl MeasurementStore for SharedPipelineStore {
    fn append(&self, measurement: &NewMeasurement) -> Result<StoredMeasurement, StoreError> {
        self.inner.append(measurement)
    }

    fn recent_measurements(&self, limit: usize) -> Result<Vec<StoredMeasurement>, StoreError> {
        self.inner.recent_measurements(limit)
    }
}

impl DeadLetterStore for SharedPipelineStore {
    fn recent_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        self.inner.recent_dead_letters(limit)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the error for a missing queue entry.
fn missing_entry(id: QueueEntryId) -> StoreError {
    StoreError::Invalid(format!("queue entry {id} not found"))
}
