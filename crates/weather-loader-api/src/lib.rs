// crates/weather-loader-api/src/lib.rs
// ============================================================================
// Module: Weather Loader API Library
// Description: HTTP ingestion API, upstream weather source, and audit sinks.
// Purpose: Expose the ingestion pipeline over HTTP.
// Dependencies: weather-loader-core, weather-loader-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! `weather-loader-api` hosts the network-facing half of Weather Loader. The
//! [`server::WeatherApiServer`] serves fetch and submit requests through the
//! core [`weather_loader_core::IngestionGateway`], optionally scheduling
//! worker passes, and writes structured audit events through
//! [`audit::AuditSink`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;
pub mod upstream;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::AuditWorkerObserver;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::build_audit_sink;
pub use server::ApiServerError;
pub use server::WeatherApiServer;
pub use server::build_pipeline_store;
pub use server::build_worker;
pub use upstream::Observation;
pub use upstream::OpenMeteoSource;
pub use upstream::UpstreamError;
pub use upstream::WeatherSource;
