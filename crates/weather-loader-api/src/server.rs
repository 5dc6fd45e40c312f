// crates/weather-loader-api/src/server.rs
// ============================================================================
// Module: Weather Loader HTTP Server
// Description: Fetch, submit, diagnostics, and verification endpoints.
// Purpose: Expose the ingestion gateway over HTTP with JSON bodies.
// Dependencies: weather-loader-core, weather-loader-config, axum, http-body-util, tokio
// ============================================================================

//! ## Overview
//! The server wires configuration into a store, an [`IngestionGateway`], an
//! upstream [`WeatherSource`], and an [`AuditSink`], then serves:
//!
//! - `GET /weather?action=fetch&city=...`: current observation for a city
//! - `POST /weather`: `{"DataBase64": ...}` submission into the queue
//! - `GET /diagnostics?limit=N`: most recent queue, measurement, dead-letter rows
//! - `POST /verify`: checksum breakdown for a record or envelope
//!
//! When `worker.poll_interval_ms` is set, worker passes also run on a timer.
//! Security posture: request bodies are untrusted and read only up to
//! `server.max_body_bytes`; larger bodies get a JSON 413.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::body::HttpBody;
use axum::extract::ConnectInfo;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::PRAGMA;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use http_body_util::BodyExt;
use http_body_util::LengthLimitError;
use http_body_util::Limited;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use weather_loader_config::StoreConfig;
use weather_loader_config::StoreType;
use weather_loader_config::WeatherLoaderConfig;
use weather_loader_core::DEFAULT_REPORT_LIMIT;
use weather_loader_core::DiagnosticsReport;
use weather_loader_core::InMemoryPipelineStore;
use weather_loader_core::IngestionGateway;
use weather_loader_core::IntegrityCodec;
use weather_loader_core::MeasurementRecord;
use weather_loader_core::Rejection;
use weather_loader_core::SharedPipelineStore;
use weather_loader_core::Worker;
use weather_loader_core::decode_record_or_envelope;
use weather_loader_store_sqlite::SqlitePipelineStore;

use crate::audit::AuditSink;
use crate::audit::AuditWorkerObserver;
use crate::audit::FetchAuditEvent;
use crate::audit::IngestAuditEvent;
use crate::audit::IngestAuditEventParams;
use crate::audit::SecurityAuditEvent;
use crate::audit::build_audit_sink;
use crate::upstream::OpenMeteoSource;
use crate::upstream::UpstreamError;
use crate::upstream::WeatherSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound for the diagnostics `limit` parameter.
pub const MAX_REPORT_LIMIT: usize = 100;
/// Cache-Control value applied to fetch responses.
const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP API server instance.
pub struct WeatherApiServer {
    /// Validated configuration.
    config: WeatherLoaderConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
    /// Worker used for scheduled passes.
    worker: Worker<SharedPipelineStore>,
}

impl WeatherApiServer {
    /// Builds a new server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when configuration or initialization fails.
    pub fn from_config(config: WeatherLoaderConfig) -> Result<Self, ApiServerError> {
        config.validate().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let secret = config
            .integrity
            .resolve_secret()
            .map_err(|err| ApiServerError::Config(err.to_string()))?;
        let codec =
            IntegrityCodec::new(&secret).map_err(|err| ApiServerError::Init(err.to_string()))?;
        let store = build_pipeline_store(&config.store)?;
        let audit =
            build_audit_sink(&config.audit).map_err(|err| ApiServerError::Init(err.to_string()))?;
        let source = OpenMeteoSource::new(&config.upstream)
            .map_err(|err| ApiServerError::Init(err.to_string()))?;
        Ok(Self::from_parts(config, codec, store, Arc::new(source), audit))
    }

    /// Builds a server from pre-constructed collaborators.
    #[must_use]
    pub fn from_parts(
        config: WeatherLoaderConfig,
        codec: IntegrityCodec,
        store: SharedPipelineStore,
        source: Arc<dyn WeatherSource>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let worker = build_worker(&config, store.clone(), Arc::clone(&audit));
        let state = Arc::new(ServerState {
            gateway: IngestionGateway::new(codec, store.clone()),
            store,
            source,
            audit,
            max_body_bytes: config.server.max_body_bytes,
            default_city: config.server.default_city.clone(),
        });
        Self {
            config,
            state,
            worker,
        }
    }

    /// Returns the HTTP router for this server.
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let scheduled = self.config.worker.poll_interval_ms.map(|interval| {
            spawn_scheduled_worker(self.worker.clone(), Duration::from_millis(interval))
        });
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ApiServerError::Transport("http bind failed".to_string()))?;
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ApiServerError::Transport("http server failed".to_string()));
        if let Some(handle) = scheduled {
            handle.abort();
        }
        result
    }
}

/// Builds the pipeline store from configuration.
///
/// # Errors
///
/// Returns [`ApiServerError::Init`] when the `SQLite` store cannot be opened.
pub fn build_pipeline_store(config: &StoreConfig) -> Result<SharedPipelineStore, ApiServerError> {
    let store = match config.store_type {
        StoreType::Memory => SharedPipelineStore::from_store(InMemoryPipelineStore::new()),
        StoreType::Sqlite => {
            let store = SqlitePipelineStore::new(&config.sqlite_config())
                .map_err(|err| ApiServerError::Init(err.to_string()))?;
            SharedPipelineStore::from_store(store)
        }
    };
    Ok(store)
}

/// Builds a worker that reports outcomes to the audit sink.
#[must_use]
pub fn build_worker(
    config: &WeatherLoaderConfig,
    store: SharedPipelineStore,
    audit: Arc<dyn AuditSink>,
) -> Worker<SharedPipelineStore> {
    Worker::new(store, config.worker_config())
        .with_observer(Arc::new(AuditWorkerObserver::new(audit)))
}

/// Runs worker passes on a fixed interval until aborted.
fn spawn_scheduled_worker(
    worker: Worker<SharedPipelineStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let pass = worker.clone();
            match tokio::task::spawn_blocking(move || pass.run_batch()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    let _ = writeln!(
                        std::io::stderr(),
                        "weather-loader-api: scheduled worker pass failed: {err}"
                    );
                }
                Err(_) => {
                    let _ = writeln!(
                        std::io::stderr(),
                        "weather-loader-api: scheduled worker pass panicked"
                    );
                }
            }
        }
    })
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Shared server state for HTTP handlers.
struct ServerState {
    /// Verifying front door of the queue.
    gateway: IngestionGateway<SharedPipelineStore>,
    /// Store used for diagnostics.
    store: SharedPipelineStore,
    /// Upstream weather source.
    source: Arc<dyn WeatherSource>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
    /// City used when the fetch action omits `city`.
    default_city: String,
}

/// Builds the router over shared state.
fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(
            "/weather",
            get(handle_weather_get).post(handle_weather_post).fallback(handle_method_not_allowed),
        )
        .route("/diagnostics", get(handle_diagnostics))
        .route("/verify", post(handle_verify))
        .with_state(state)
}

/// Query parameters for `GET /weather`.
#[derive(Debug, Default, Deserialize)]
struct WeatherQuery {
    /// Requested action; only `fetch` is supported.
    action: Option<String>,
    /// City to look up.
    city: Option<String>,
}

/// Query parameters for `GET /diagnostics`.
#[derive(Debug, Default, Deserialize)]
struct DiagnosticsQuery {
    /// Rows per view.
    limit: Option<usize>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles the fetch action.
async fn handle_weather_get(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WeatherQuery>,
) -> Response {
    if query.action.as_deref() != Some("fetch") {
        return method_not_allowed();
    }
    let city = query.city.unwrap_or_else(|| state.default_city.clone()).trim().to_string();
    if city.is_empty() {
        state.audit.record_fetch(&FetchAuditEvent::new(city, "invalid", 400));
        return no_store(json_error(StatusCode::BAD_REQUEST, "Missing city"));
    }
    let source = Arc::clone(&state.source);
    let lookup = city.clone();
    let result = tokio::task::spawn_blocking(move || source.current(&lookup))
        .await
        .unwrap_or_else(|_| Err(UpstreamError::Failed("lookup task failed".to_string())));
    let (status, outcome, response) = match result {
        Ok(observation) => (StatusCode::OK, "found", Json(observation).into_response()),
        Err(UpstreamError::NotFound) => (
            StatusCode::NOT_FOUND,
            "not_found",
            json_error(StatusCode::NOT_FOUND, "City not found"),
        ),
        Err(err @ UpstreamError::Failed(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed",
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        ),
    };
    state.audit.record_fetch(&FetchAuditEvent::new(city, outcome, status.as_u16()));
    no_store(response)
}

/// Handles envelope submissions.
async fn handle_weather_post(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Body,
) -> Response {
    let peer_ip = Some(peer.ip().to_string());
    let declared_bytes = declared_length(&body);
    let (status, payload) = match read_body(body, state.max_body_bytes).await {
        Ok(bytes) => run_blocking(|| submit(&state, &bytes, peer_ip)),
        Err(err) => reject_body(&state, &err, peer_ip, declared_bytes),
    };
    (status, Json(payload)).into_response()
}

/// Rejects unsupported methods and actions on `/weather`.
async fn handle_method_not_allowed() -> Response {
    method_not_allowed()
}

/// Handles diagnostics snapshots.
async fn handle_diagnostics(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<DiagnosticsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT).clamp(1, MAX_REPORT_LIMIT);
    match run_blocking(|| DiagnosticsReport::collect(&state.store, limit)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "DB error", "details": err.to_string()})),
        )
            .into_response(),
    }
}

/// Handles checksum verification reports.
async fn handle_verify(State(state): State<Arc<ServerState>>, body: Body) -> Response {
    let bytes = match read_body(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => return json_error(err.status(), &err.to_string()),
    };
    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    let object = match decode_record_or_envelope(&value) {
        Ok(object) => object,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    match MeasurementRecord::from_json_object(&object) {
        Ok(record) => (StatusCode::OK, Json(state.gateway.codec().inspect(&record))).into_response(),
        Err(err) => json_error(StatusCode::BAD_REQUEST, &Rejection::from(err).to_string()),
    }
}

// ============================================================================
// SECTION: Submission
// ============================================================================

/// Body read failures, answered before any decoding.
#[derive(Debug, thiserror::Error)]
enum BodyError {
    /// The body grew past the configured cap.
    #[error("Request body too large")]
    TooLarge,
    /// The transport failed mid-body.
    #[error("Invalid request body")]
    Unreadable,
}

impl BodyError {
    /// Returns the HTTP status for the failure.
    const fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unreadable => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the normalized kind recorded in the ingest audit.
    const fn kind(&self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::Unreadable => "unreadable",
        }
    }
}

/// Collects a request body, stopping once it exceeds `max_body_bytes`.
async fn read_body(body: Body, max_body_bytes: usize) -> Result<Bytes, BodyError> {
    match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(BodyError::TooLarge),
        Err(_) => Err(BodyError::Unreadable),
    }
}

/// Returns the body size announced by the client, when exact.
fn declared_length(body: &Body) -> Option<usize> {
    body.size_hint().exact().and_then(|len| usize::try_from(len).ok())
}

/// Answers a body that could not be read and records the ingest audit.
fn reject_body(
    state: &ServerState,
    error: &BodyError,
    peer_ip: Option<String>,
    declared_bytes: Option<usize>,
) -> (StatusCode, Value) {
    let status = error.status();
    let request_bytes = match error {
        BodyError::TooLarge => {
            declared_bytes.unwrap_or(0).max(state.max_body_bytes.saturating_add(1))
        }
        BodyError::Unreadable => declared_bytes.unwrap_or(0),
    };
    state.audit.record_ingest(&IngestAuditEvent::new(IngestAuditEventParams {
        peer_ip,
        outcome: "rejected",
        status: status.as_u16(),
        error_kind: Some(error.kind()),
        request_bytes,
        queue_id: None,
    }));
    (status, json!({"error": error.to_string()}))
}

/// Runs a submission through the gateway and records audit events.
fn submit(state: &ServerState, body: &[u8], peer_ip: Option<String>) -> (StatusCode, Value) {
    let request_bytes = body.len();
    let (status, payload, error_kind, queue_id) = match state.gateway.accept_bytes(body) {
        Ok(accepted) => (
            StatusCode::OK,
            json!({"ok": true, "queued": true}),
            None,
            Some(accepted.entry.id.get()),
        ),
        Err(Rejection::Authentication) => {
            state.audit.record_security(&SecurityAuditEvent::checksum_invalid(peer_ip.clone()));
            (
                StatusCode::UNAUTHORIZED,
                json!({"error": Rejection::Authentication.to_string()}),
                Some(Rejection::Authentication.kind()),
                None,
            )
        }
        Err(Rejection::Store(err)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "DB error", "details": err.to_string()}),
            Some("store"),
            None,
        ),
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            json!({"error": rejection.to_string()}),
            Some(rejection.kind()),
            None,
        ),
    };
    let outcome = if status == StatusCode::OK {
        "accepted"
    } else if status.is_client_error() {
        "rejected"
    } else {
        "error"
    };
    state.audit.record_ingest(&IngestAuditEvent::new(IngestAuditEventParams {
        peer_ip,
        outcome,
        status: status.as_u16(),
        error_kind,
        request_bytes,
        queue_id,
    }));
    (status, payload)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Executes blocking store work, shifting to a blocking context when available.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Builds a `{"error": message}` response.
fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

/// Builds the 405 response.
fn method_not_allowed() -> Response {
    json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Marks a response as non-cacheable.
fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
