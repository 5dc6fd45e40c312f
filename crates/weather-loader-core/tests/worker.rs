// crates/weather-loader-core/tests/worker.rs
// ============================================================================
// Module: Queue Worker Tests
// Description: Verifies batch processing, bounded retries, and dead-lettering.
// ============================================================================
//! ## Overview
//! Exercises the worker against the in-memory store and a store wrapper whose
//! measurement writes always fail.

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
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use serde_json::json;
use weather_loader_core::BatchSummary;
use weather_loader_core::DeadLetterEntry;
use weather_loader_core::DeadLetterStore;
use weather_loader_core::EntryOutcome;
use weather_loader_core::InMemoryPipelineStore;
use weather_loader_core::IngestionGateway;
use weather_loader_core::IntegrityCodec;
use weather_loader_core::MeasurementRecord;
use weather_loader_core::MeasurementStore;
use weather_loader_core::NewMeasurement;
use weather_loader_core::QueueEntry;
use weather_loader_core::QueueEntryId;
use weather_loader_core::QueueStatus;
use weather_loader_core::QueueStore;
use weather_loader_core::SharedSecret;
use weather_loader_core::StoreError;
use weather_loader_core::StoredMeasurement;
use weather_loader_core::Worker;
use weather_loader_core::WorkerConfig;
use weather_loader_core::WorkerObserver;
use weather_loader_core::envelope;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const SECRET: &str = "ThisIsASecretKey";

fn codec() -> IntegrityCodec {
    IntegrityCodec::new(&SharedSecret::from(SECRET)).unwrap()
}

fn submit(store: &InMemoryPipelineStore, record: MeasurementRecord) -> QueueEntry {
    let gateway = IngestionGateway::new(codec(), store.clone());
    let body = serde_json::to_value(envelope::encode(&codec().seal(record)).unwrap()).unwrap();
    gateway.accept(&body).unwrap().entry
}

fn cieszyn() -> MeasurementRecord {
    MeasurementRecord::unsigned("temperature", "Cieszyn", 0.4, "2025-12-28T17:00Z")
}

/// Store whose measurement writes always fail.
#[derive(Clone)]
struct FailingWrites {
    inner: InMemoryPipelineStore,
    /// Resets every `PROCESSING` entry to `NEW` before failing, as a
    /// concurrent stale-lock reclaim would.
    reset_before_failing: bool,
}

impl QueueStore for FailingWrites {
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
        _id: QueueEntryId,
        _measurement: &NewMeasurement,
    ) -> Result<StoredMeasurement, StoreError> {
        if self.reset_before_failing {
            self.inner.reclaim_stale(i64::MAX)?;
        }
        Err(StoreError::Unavailable("database is locked".to_string()))
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
}

/// Observer collecting entry outcomes.
#[derive(Default)]
struct Recorder {
    entries: Mutex<Vec<(QueueEntryId, u32, EntryOutcome)>>,
    batches: Mutex<Vec<BatchSummary>>,
}

impl WorkerObserver for Recorder {
    fn on_entry(&self, id: QueueEntryId, attempts: u32, outcome: &EntryOutcome) {
        self.entries.lock().unwrap().push((id, attempts, outcome.clone()));
    }

    fn on_batch(&self, summary: &BatchSummary) {
        self.batches.lock().unwrap().push(*summary);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn end_to_end_record_is_stored_once() {
    let store = InMemoryPipelineStore::new();
    submit(&store, cieszyn());
    let summary = Worker::new(store.clone(), WorkerConfig::default()).run_batch().unwrap();
    assert_eq!(summary.found, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.dead_lettered, 0);

    let rows = store.recent_measurements(10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, 0.4);
    assert_eq!(rows[0].location, "Cieszyn");
    assert_eq!(rows[0].timestamp, "2025-12-28 17:00:00.000000");
    assert_eq!(rows[0].checksum, "6DeNoiHHxesIyzBaXxjhcHXNlhI1KXb9fkkNr9Mi5EI=");
    assert!(store.recent_entries(10).unwrap().is_empty());
    assert!(store.recent_dead_letters(10).unwrap().is_empty());
}

#[test]
fn empty_queue_yields_empty_summary() {
    let summary =
        Worker::new(InMemoryPipelineStore::new(), WorkerConfig::default()).run_batch().unwrap();
    assert_eq!(summary, BatchSummary::default());
}

#[test]
fn failing_entry_is_retried_then_dead_lettered() {
    let store = InMemoryPipelineStore::new();
    let mut record = cieszyn();
    record.timestamp = "not-a-timestamp".to_string();
    let entry = submit(&store, record);
    let worker = Worker::new(store.clone(), WorkerConfig::default());

    for attempt in 1..=2 {
        let summary = worker.run_batch().unwrap();
        assert_eq!(summary.retried, 1);
        let current = store.get(entry.id).unwrap().unwrap();
        assert_eq!(current.status, QueueStatus::New);
        assert_eq!(current.attempts, attempt);
        assert_eq!(current.locked_at, None);
    }

    let summary = worker.run_batch().unwrap();
    assert_eq!(summary.dead_lettered, 1);
    assert!(store.get(entry.id).unwrap().is_none());
    assert!(store.pending(10).unwrap().is_empty());
    let dead = store.recent_dead_letters(10).unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].payload, entry.payload);
    assert!(dead[0].error_message.contains("invalid timestamp"));
    assert!(store.recent_measurements(10).unwrap().is_empty());
}

#[test]
fn failed_measurement_write_leaves_entry_queued() {
    let store = FailingWrites {
        inner: InMemoryPipelineStore::new(),
        reset_before_failing: false,
    };
    let entry = submit(&store.inner, cieszyn());
    let summary = Worker::new(store.clone(), WorkerConfig::default()).run_batch().unwrap();
    assert_eq!(summary.retried, 1);
    let current = store.get(entry.id).unwrap().unwrap();
    assert_eq!(current.status, QueueStatus::New);
    assert_eq!(current.attempts, 1);
    assert!(store.inner.recent_measurements(10).unwrap().is_empty());
}

#[test]
fn entry_reset_elsewhere_is_skipped_not_retried() {
    let store = FailingWrites {
        inner: InMemoryPipelineStore::new(),
        reset_before_failing: true,
    };
    let entry = submit(&store.inner, cieszyn());
    let recorder = Arc::new(Recorder::default());
    let worker =
        Worker::new(store.clone(), WorkerConfig::default()).with_observer(recorder.clone());
    let summary = worker.run_batch().unwrap();
    assert_eq!(summary.found, 1);
    assert_eq!(summary.retried, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(recorder.entries.lock().unwrap()[0].2, EntryOutcome::Skipped);
    let current = store.get(entry.id).unwrap().unwrap();
    assert_eq!(current.status, QueueStatus::New);
    assert_eq!(current.attempts, 1);
}

#[test]
fn dead_letter_error_is_truncated() {
    let store = InMemoryPipelineStore::new();
    let entry = store.enqueue(&json!({"Measurement": "t"}).to_string()).unwrap();
    let config = WorkerConfig {
        max_attempts: 1,
        max_error_chars: 8,
        ..WorkerConfig::default()
    };
    let summary = Worker::new(store.clone(), config).run_batch().unwrap();
    assert_eq!(summary.dead_lettered, 1);
    let dead = store.recent_dead_letters(1).unwrap();
    assert_eq!(dead[0].error_message, "Missing ");
    assert_eq!(dead[0].payload, entry.payload);
}

#[test]
fn batch_size_bounds_a_pass_oldest_first() {
    let store = InMemoryPipelineStore::new();
    let first = submit(&store, cieszyn());
    submit(&store, cieszyn());
    submit(&store, cieszyn());
    let recorder = Arc::new(Recorder::default());
    let config = WorkerConfig {
        batch_size: 2,
        ..WorkerConfig::default()
    };
    let worker = Worker::new(store.clone(), config).with_observer(recorder.clone());
    let summary = worker.run_batch().unwrap();
    assert_eq!(summary.found, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(store.pending(10).unwrap().len(), 1);
    let entries = recorder.entries.lock().unwrap();
    assert_eq!(entries[0].0, first.id);
    assert_eq!(entries[0].1, 1);
    assert_eq!(entries[0].2.label(), "stored");
    assert_eq!(recorder.batches.lock().unwrap().len(), 1);
}

#[test]
fn concurrent_claims_have_one_winner() {
    let store = InMemoryPipelineStore::new();
    let entry = submit(&store, cieszyn());
    let handles: Vec<_> = (0 .. 8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.claim(entry.id, 1).unwrap().is_some())
        })
        .collect();
    let winners = handles.into_iter().map(|handle| handle.join().unwrap()).filter(|won| *won).count();
    assert_eq!(winners, 1);
    assert_eq!(store.get(entry.id).unwrap().unwrap().attempts, 1);
}

#[test]
fn stale_locks_are_reclaimed_only_when_configured() {
    let store = InMemoryPipelineStore::new();
    let entry = submit(&store, cieszyn());
    store.claim(entry.id, 0).unwrap().unwrap();

    let summary = Worker::new(store.clone(), WorkerConfig::default()).run_batch().unwrap();
    assert_eq!(summary.found, 0);
    assert_eq!(store.get(entry.id).unwrap().unwrap().status, QueueStatus::Processing);

    let config = WorkerConfig {
        stale_lock_ms: Some(1_000),
        ..WorkerConfig::default()
    };
    let summary = Worker::new(store.clone(), config).run_batch().unwrap();
    assert_eq!(summary.reclaimed, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(store.recent_measurements(10).unwrap().len(), 1);
}
