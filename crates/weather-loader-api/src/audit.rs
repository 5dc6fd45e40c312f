// crates/weather-loader-api/src/audit.rs
// ============================================================================
// Module: Weather Loader Audit Logging
// Description: Structured audit events for ingestion, fetch, and worker passes.
// Purpose: Emit JSON-line audit records without hard logging dependencies.
// Dependencies: weather-loader-core, weather-loader-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain `serde` structs written as one JSON object per line.
//! Sinks route them to stderr, an append-only file, or nowhere. Checksum
//! failures get their own `security_audit` event so they are never mixed with
//! ordinary validation failures.
//!
//! Audit records never carry payload contents or secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Serialize;
use weather_loader_config::AuditConfig;
use weather_loader_config::AuditSinkKind;
use weather_loader_core::BatchSummary;
use weather_loader_core::EntryOutcome;
use weather_loader_core::QueueEntryId;
use weather_loader_core::WorkerObserver;
use weather_loader_core::unix_millis;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Submission audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Outcome label (`accepted`, `rejected`, `error`).
    pub outcome: &'static str,
    /// HTTP status returned to the client.
    pub status: u16,
    /// Normalized rejection kind.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Queue entry identifier when accepted.
    pub queue_id: Option<i64>,
}

/// Inputs required to construct a submission audit event.
pub struct IngestAuditEventParams {
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Outcome label.
    pub outcome: &'static str,
    /// HTTP status returned to the client.
    pub status: u16,
    /// Normalized rejection kind.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Queue entry identifier when accepted.
    pub queue_id: Option<i64>,
}

impl IngestAuditEvent {
    /// Creates a new submission audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: IngestAuditEventParams) -> Self {
        Self {
            event: "ingest_request",
            timestamp_ms: unix_millis(),
            peer_ip: params.peer_ip,
            outcome: params.outcome,
            status: params.status,
            error_kind: params.error_kind,
            request_bytes: params.request_bytes,
            queue_id: params.queue_id,
        }
    }
}

/// Security audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Security event kind.
    pub kind: &'static str,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Optional message.
    pub message: Option<String>,
}

impl SecurityAuditEvent {
    /// Creates a checksum failure event.
    #[must_use]
    pub fn checksum_invalid(peer_ip: Option<String>) -> Self {
        Self {
            event: "security_audit",
            timestamp_ms: unix_millis(),
            kind: "checksum_invalid",
            peer_ip,
            message: Some("submitted checksum does not match record contents".to_string()),
        }
    }
}

/// Upstream lookup audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct FetchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Requested city.
    pub city: String,
    /// Outcome label (`found`, `not_found`, `failed`, `invalid`).
    pub outcome: &'static str,
    /// HTTP status returned to the client.
    pub status: u16,
}

impl FetchAuditEvent {
    /// Creates a new fetch audit event.
    #[must_use]
    pub fn new(city: impl Into<String>, outcome: &'static str, status: u16) -> Self {
        Self {
            event: "fetch_request",
            timestamp_ms: unix_millis(),
            city: city.into(),
            outcome,
            status,
        }
    }
}

/// Per-entry worker audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerEntryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Queue entry identifier.
    pub entry_id: i64,
    /// Attempt count after the pass.
    pub attempts: u32,
    /// Outcome label.
    pub outcome: &'static str,
    /// Processing or store error, when any.
    pub error: Option<String>,
}

impl WorkerEntryAuditEvent {
    /// Creates a worker entry event from an outcome.
    #[must_use]
    pub fn new(id: QueueEntryId, attempts: u32, outcome: &EntryOutcome) -> Self {
        let error = match outcome {
            EntryOutcome::Retry {
                error,
            }
            | EntryOutcome::DeadLetter {
                error,
            }
            | EntryOutcome::Failed {
                error,
            } => Some(error.clone()),
            EntryOutcome::Stored {
                ..
            }
            | EntryOutcome::Skipped => None,
        };
        Self {
            event: "worker_entry",
            timestamp_ms: unix_millis(),
            entry_id: id.get(),
            attempts,
            outcome: outcome.label(),
            error,
        }
    }
}

/// Per-pass worker audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerBatchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Pass counters.
    #[serde(flatten)]
    pub summary: BatchSummary,
}

impl WorkerBatchAuditEvent {
    /// Creates a worker batch event.
    #[must_use]
    pub fn new(summary: BatchSummary) -> Self {
        Self {
            event: "worker_batch",
            timestamp_ms: unix_millis(),
            summary,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for pipeline events.
pub trait AuditSink: Send + Sync {
    /// Record a submission event.
    fn record_ingest(&self, event: &IngestAuditEvent);

    /// Record a security event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}

    /// Record an upstream lookup event.
    fn record_fetch(&self, _event: &FetchAuditEvent) {}

    /// Record a per-entry worker event.
    fn record_worker_entry(&self, _event: &WorkerEntryAuditEvent) {}

    /// Record a per-pass worker event.
    fn record_worker_batch(&self, _event: &WorkerBatchAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        Self::emit(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        Self::emit(event);
    }

    fn record_fetch(&self, event: &FetchAuditEvent) {
        Self::emit(event);
    }

    fn record_worker_entry(&self, event: &WorkerEntryAuditEvent) {
        Self::emit(event);
    }

    fn record_worker_batch(&self, event: &WorkerBatchAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        self.emit(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.emit(event);
    }

    fn record_fetch(&self, event: &FetchAuditEvent) {
        self.emit(event);
    }

    fn record_worker_entry(&self, event: &WorkerEntryAuditEvent) {
        self.emit(event);
    }

    fn record_worker_batch(&self, event: &WorkerBatchAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_ingest(&self, _event: &IngestAuditEvent) {}
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the file sink cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    let sink: Arc<dyn AuditSink> = match (config.sink, config.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Arc::new(StderrAuditSink),
        (AuditSinkKind::None, _) => Arc::new(NoopAuditSink),
        (AuditSinkKind::File, Some(path)) => Arc::new(FileAuditSink::new(Path::new(path))?),
        (AuditSinkKind::File, None) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file audit sink requires a path",
            ));
        }
    };
    Ok(sink)
}

// ============================================================================
// SECTION: Worker Observer
// ============================================================================

/// Worker observer that forwards outcomes to an audit sink.
#[derive(Clone)]
pub struct AuditWorkerObserver {
    /// Destination sink.
    sink: Arc<dyn AuditSink>,
}

impl AuditWorkerObserver {
    /// Creates an observer writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
        }
    }
}

impl WorkerObserver for AuditWorkerObserver {
    fn on_entry(&self, id: QueueEntryId, attempts: u32, outcome: &EntryOutcome) {
        self.sink.record_worker_entry(&WorkerEntryAuditEvent::new(id, attempts, outcome));
    }

    fn on_batch(&self, summary: &BatchSummary) {
        self.sink.record_worker_batch(&WorkerBatchAuditEvent::new(*summary));
    }
}
