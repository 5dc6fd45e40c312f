// crates/weather-loader-api/tests/audit.rs
// ============================================================================
// Module: Audit Sink Tests
// Description: JSON-line output of the file sink and worker observer wiring.
// Purpose: Ensure audit events are structured, append-only, and payload-free.
// Dependencies: weather-loader-api, weather-loader-config, weather-loader-core
// ============================================================================

//! Audit sink output and worker observer tests.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use weather_loader_api::AuditSink;
use weather_loader_api::AuditWorkerObserver;
use weather_loader_api::FileAuditSink;
use weather_loader_api::audit::IngestAuditEvent;
use weather_loader_api::audit::IngestAuditEventParams;
use weather_loader_api::audit::SecurityAuditEvent;
use weather_loader_api::build_audit_sink;
use weather_loader_config::AuditConfig;
use weather_loader_config::AuditSinkKind;
use weather_loader_core::InMemoryPipelineStore;
use weather_loader_core::QueueStore;
use weather_loader_core::Worker;
use weather_loader_core::WorkerConfig;

fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn file_sink_appends_one_json_object_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = FileAuditSink::new(&path).unwrap();
    sink.record_security(&SecurityAuditEvent::checksum_invalid(Some("10.0.0.7".to_string())));
    sink.record_ingest(&IngestAuditEvent::new(IngestAuditEventParams {
        peer_ip: Some("10.0.0.7".to_string()),
        outcome: "rejected",
        status: 401,
        error_kind: Some("authentication"),
        request_bytes: 180,
        queue_id: None,
    }));

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "security_audit");
    assert_eq!(lines[0]["kind"], "checksum_invalid");
    assert_eq!(lines[1]["event"], "ingest_request");
    assert_eq!(lines[1]["status"], 401);
    assert_eq!(lines[1]["error_kind"], "authentication");
}

#[test]
fn build_audit_sink_honors_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("selected.jsonl");
    let sink = build_audit_sink(&AuditConfig {
        sink: AuditSinkKind::File,
        path: Some(path.to_string_lossy().into_owned()),
    })
    .unwrap();
    sink.record_security(&SecurityAuditEvent::checksum_invalid(None));
    assert_eq!(read_lines(&path).len(), 1);

    assert!(
        build_audit_sink(&AuditConfig {
            sink: AuditSinkKind::File,
            path: None,
        })
        .is_err()
    );
    assert!(build_audit_sink(&AuditConfig::default()).is_ok());
}

#[test]
fn worker_observer_emits_entry_and_batch_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.jsonl");
    let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&path).unwrap());
    let store = InMemoryPipelineStore::new();
    store.enqueue("{\"Measurement\":\"temperature\"}").unwrap();
    let worker = Worker::new(store, WorkerConfig::default())
        .with_observer(Arc::new(AuditWorkerObserver::new(sink)));
    let summary = worker.run_batch().unwrap();
    assert_eq!(summary.retried, 1);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "worker_entry");
    assert_eq!(lines[0]["outcome"], "retry");
    assert_eq!(lines[0]["attempts"], 1);
    assert_eq!(lines[0]["error"], "Missing field: Location");
    assert_eq!(lines[1]["event"], "worker_batch");
    assert_eq!(lines[1]["found"], 1);
    assert_eq!(lines[1]["retried"], 1);
    assert!(!fs::read_to_string(&path).unwrap().contains("temperature"));
}
