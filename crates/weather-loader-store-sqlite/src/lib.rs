// crates/weather-loader-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Pipeline Store
// Description: Durable pipeline store backend using SQLite.
// Purpose: Persist the queue, measurements, and dead letters across processes.
// Dependencies: weather-loader-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`weather_loader_core::PipelineStore`].
//! Queue claims are single conditional `UPDATE ... RETURNING` statements, so
//! independent worker processes sharing one database file never claim the
//! same entry twice. Entry resolution (store or dead-letter) is one immediate
//! transaction. Security posture: database contents are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqlitePipelineStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
