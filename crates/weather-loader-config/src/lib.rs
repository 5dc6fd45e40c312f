// crates/weather-loader-config/src/lib.rs
// ============================================================================
// Module: Weather Loader Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for weather-loader.toml semantics.
// Dependencies: weather-loader-core, weather-loader-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `weather-loader-config` defines the configuration model shared by the API
//! server and the CLI. Loading is strict and fail-closed: oversized, non-UTF-8,
//! unparseable, or inconsistent files are rejected before anything starts.
//!
//! Security posture: config inputs are untrusted and the integrity secret is
//! never rendered through `Debug`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
