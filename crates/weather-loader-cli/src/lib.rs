// crates/weather-loader-cli/src/lib.rs
// ============================================================================
// Module: Weather Loader CLI Library
// Description: Shared helpers for the Weather Loader command-line interface.
// Purpose: Keep command logic testable apart from argument parsing and output.
// Dependencies: weather-loader-api, weather-loader-config, weather-loader-core
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) parses arguments and renders
//! output; the operations it dispatches to live in [`tools`] so integration
//! tests can call them directly.
//!
//! Security posture: CLI inputs are untrusted and must be validated before
//! they reach the integrity codec or the store.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Signing, verification, worker, and diagnostics operations.
pub mod tools;

pub use tools::SignedMeasurement;
pub use tools::ToolError;
pub use tools::collect_report;
pub use tools::load_config;
pub use tools::resolve_codec;
pub use tools::run_worker_pass;
pub use tools::sign_measurement;
pub use tools::verify_input;
