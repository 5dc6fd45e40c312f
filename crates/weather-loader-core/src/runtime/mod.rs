// crates/weather-loader-core/src/runtime/mod.rs
// ============================================================================
// Module: Weather Loader Runtime
// Description: Ingestion gateway, queue worker, diagnostics, and stores.
// Purpose: Execute the producer -> queue -> worker -> storage pipeline.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules hold the pipeline logic. API and CLI surfaces call into
//! these types instead of talking to stores directly.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod diagnostics;
pub mod gateway;
pub mod store;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use diagnostics::DEFAULT_REPORT_LIMIT;
pub use diagnostics::DiagnosticsReport;
pub use gateway::Accepted;
pub use gateway::IngestionGateway;
pub use gateway::Rejection;
pub use store::InMemoryPipelineStore;
pub use store::SharedPipelineStore;
pub use worker::BatchSummary;
pub use worker::DEFAULT_BATCH_SIZE;
pub use worker::DEFAULT_MAX_ATTEMPTS;
pub use worker::EntryOutcome;
pub use worker::NoopWorkerObserver;
pub use worker::ProcessingError;
pub use worker::Worker;
pub use worker::WorkerConfig;
pub use worker::WorkerError;
pub use worker::WorkerObserver;
