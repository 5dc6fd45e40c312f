// crates/weather-loader-core/src/lib.rs
// ============================================================================
// Module: Weather Loader Core Library
// Description: Public API surface for the Weather Loader core.
// Purpose: Expose record types, codecs, store interfaces, and the pipeline runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Weather Loader core implements the measurement ingestion pipeline: signed
//! records arrive inside base64 envelopes, are verified with a shared-secret
//! HMAC, are queued durably, and are later converted into permanent
//! measurement rows by a bounded-retry worker. The crate performs no I/O of
//! its own; persistence is reached through the [`interfaces`] traits.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::DeadLetterStore;
pub use interfaces::MeasurementStore;
pub use interfaces::PipelineStore;
pub use interfaces::QueueStore;
pub use interfaces::StoreError;
pub use runtime::Accepted;
pub use runtime::BatchSummary;
pub use runtime::DEFAULT_BATCH_SIZE;
pub use runtime::DEFAULT_MAX_ATTEMPTS;
pub use runtime::DEFAULT_REPORT_LIMIT;
pub use runtime::DiagnosticsReport;
pub use runtime::EntryOutcome;
pub use runtime::InMemoryPipelineStore;
pub use runtime::IngestionGateway;
pub use runtime::NoopWorkerObserver;
pub use runtime::ProcessingError;
pub use runtime::Rejection;
pub use runtime::SharedPipelineStore;
pub use runtime::Worker;
pub use runtime::WorkerConfig;
pub use runtime::WorkerError;
pub use runtime::WorkerObserver;
