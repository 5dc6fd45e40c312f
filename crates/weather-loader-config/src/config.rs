// crates/weather-loader-config/src/config.rs
// ============================================================================
// Module: Weather Loader Configuration
// Description: Configuration loading and validation for Weather Loader.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: weather-loader-core, weather-loader-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path is taken from the caller, then `WEATHER_LOADER_CONFIG`, then
//! `weather-loader.toml` in the working directory. Missing or invalid
//! configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use weather_loader_core::DEFAULT_BATCH_SIZE;
use weather_loader_core::DEFAULT_MAX_ATTEMPTS;
use weather_loader_core::DEFAULT_MAX_ERROR_CHARS;
use weather_loader_core::SharedSecret;
use weather_loader_core::WorkerConfig;
use weather_loader_store_sqlite::SqliteStoreConfig;
use weather_loader_store_sqlite::SqliteStoreMode;
use weather_loader_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "weather-loader.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "WEATHER_LOADER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` database path.
pub(crate) const DEFAULT_DB_PATH: &str = "weather-loader.db";
/// Default store busy timeout in milliseconds.
pub(crate) const DEFAULT_BUSY_TIMEOUT_MS: u64 = 8_000;
/// Maximum store busy timeout in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Maximum worker batch size.
pub(crate) const MAX_BATCH_SIZE: usize = 1_000;
/// Maximum worker attempt ceiling.
pub(crate) const MAX_ATTEMPTS_LIMIT: u32 = 100;
/// Maximum dead-letter error message length.
pub(crate) const MAX_ERROR_CHARS_LIMIT: usize = 65_535;
/// Minimum scheduled worker interval in milliseconds.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Default HTTP bind address.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
/// Maximum configurable request body size in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default city used by the fetch action.
pub(crate) const DEFAULT_CITY: &str = "Cieszyn";
/// Default geocoding endpoint.
pub(crate) const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
/// Default forecast endpoint.
pub(crate) const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
/// Default upstream request timeout in milliseconds.
pub(crate) const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 8_000;
/// Minimum upstream request timeout in milliseconds.
pub(crate) const MIN_UPSTREAM_TIMEOUT_MS: u64 = 100;
/// Maximum upstream request timeout in milliseconds.
pub(crate) const MAX_UPSTREAM_TIMEOUT_MS: u64 = 60_000;
/// Default geocoding language.
pub(crate) const DEFAULT_LANGUAGE: &str = "pl";
/// Maximum length of short text settings (city, language, user agent).
pub(crate) const MAX_SHORT_TEXT_LENGTH: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Weather Loader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherLoaderConfig {
    /// Integrity secret configuration.
    pub integrity: IntegrityConfig,
    /// Pipeline store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Worker configuration.
    #[serde(default)]
    pub worker: WorkerSection,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream weather source configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl WeatherLoaderConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.integrity.validate()?;
        self.store.validate()?;
        self.worker.validate()?;
        self.server.validate()?;
        self.upstream.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the worker tuning derived from the `[worker]` section.
    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        self.worker.to_worker_config()
    }
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

/// Integrity secret configuration. Exactly one source must be set.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct IntegrityConfig {
    /// Inline shared secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Name of an environment variable holding the shared secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
}

impl fmt::Debug for IntegrityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrityConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("secret_env", &self.secret_env)
            .finish()
    }
}

impl IntegrityConfig {
    /// Validates integrity configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.secret, &self.secret_env) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "integrity.secret and integrity.secret_env are mutually exclusive".to_string(),
            )),
            (None, None) => Err(ConfigError::Invalid(
                "integrity requires secret or secret_env".to_string(),
            )),
            (Some(secret), None) if secret.is_empty() => {
                Err(ConfigError::Invalid("integrity.secret must be non-empty".to_string()))
            }
            (None, Some(name)) if name.trim().is_empty() => {
                Err(ConfigError::Invalid("integrity.secret_env must be non-empty".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Resolves the shared secret, reading the environment when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the secret is missing or empty.
    pub fn resolve_secret(&self) -> Result<SharedSecret, ConfigError> {
        let secret = match (&self.secret, &self.secret_env) {
            (Some(secret), _) => secret.clone(),
            (None, Some(name)) => env::var(name.trim()).map_err(|_| {
                ConfigError::Invalid(format!("integrity secret env var {name} is not set"))
            })?,
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "integrity requires secret or secret_env".to_string(),
                ));
            }
        };
        if secret.is_empty() {
            return Err(ConfigError::Invalid("integrity secret must be non-empty".to_string()));
        }
        Ok(SharedSecret::from(secret))
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Pipeline store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the `SQLite`-backed durable store.
    #[default]
    Sqlite,
    /// Use the in-memory store (tests and demos).
    Memory,
}

/// Pipeline store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path; defaults to `weather-loader.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                if let Some(path) = &self.path {
                    validate_path_string("store.path", &path.to_string_lossy())?;
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` store configuration for this section.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Worker configuration section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerSection {
    /// Maximum `NEW` entries examined per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts after which a failing entry is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Character cap for dead-letter error messages.
    #[serde(default = "default_max_error_chars")]
    pub max_error_chars: usize,
    /// Optional lock age (seconds) after which `PROCESSING` entries are reclaimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_lock_secs: Option<u64>,
    /// Optional interval (milliseconds) for scheduled passes inside `serve`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            max_error_chars: default_max_error_chars(),
            stale_lock_secs: None,
            poll_interval_ms: None,
        }
    }
}

impl WorkerSection {
    /// Validates worker configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "worker.batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "worker.max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}"
            )));
        }
        if self.max_error_chars == 0 || self.max_error_chars > MAX_ERROR_CHARS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "worker.max_error_chars must be between 1 and {MAX_ERROR_CHARS_LIMIT}"
            )));
        }
        if self.stale_lock_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "worker.stale_lock_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(interval) = self.poll_interval_ms
            && interval < MIN_POLL_INTERVAL_MS
        {
            return Err(ConfigError::Invalid(format!(
                "worker.poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        Ok(())
    }

    /// Converts the section into core worker tuning.
    #[must_use]
    pub fn to_worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            max_error_chars: self.max_error_chars,
            stale_lock_ms: self
                .stale_lock_secs
                .map(|secs| i64::try_from(secs.saturating_mul(1_000)).unwrap_or(i64::MAX)),
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// City used when the fetch action omits `city`.
    #[serde(default = "default_city")]
    pub default_city: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            default_city: default_city(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_MAX_BODY_BYTES}"
            )));
        }
        validate_short_text("server.default_city", &self.default_city)
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address cannot be parsed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }
}

// ============================================================================
// SECTION: Upstream
// ============================================================================

/// Upstream weather source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Geocoding endpoint.
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    /// Forecast endpoint.
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    /// Request timeout in milliseconds, applied to each call.
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    /// User agent sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Geocoding result language.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_ms: default_upstream_timeout_ms(),
            user_agent: default_user_agent(),
            language: default_language(),
        }
    }
}

impl UpstreamConfig {
    /// Validates upstream configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("upstream.geocoding_url", &self.geocoding_url)?;
        validate_http_url("upstream.forecast_url", &self.forecast_url)?;
        if !(MIN_UPSTREAM_TIMEOUT_MS ..= MAX_UPSTREAM_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "upstream.timeout_ms must be between {MIN_UPSTREAM_TIMEOUT_MS} and \
                 {MAX_UPSTREAM_TIMEOUT_MS}"
            )));
        }
        validate_short_text("upstream.user_agent", &self.user_agent)?;
        validate_short_text("upstream.language", &self.language)
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the file sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (_, Some(path)) => validate_path_string("audit.path", path),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default store busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default worker batch size.
const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Default worker attempt ceiling.
const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Default dead-letter error cap.
const fn default_max_error_chars() -> usize {
    DEFAULT_MAX_ERROR_CHARS
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default max request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default fetch city.
fn default_city() -> String {
    DEFAULT_CITY.to_string()
}

/// Default geocoding endpoint.
fn default_geocoding_url() -> String {
    DEFAULT_GEOCODING_URL.to_string()
}

/// Default forecast endpoint.
fn default_forecast_url() -> String {
    DEFAULT_FORECAST_URL.to_string()
}

/// Default upstream timeout.
const fn default_upstream_timeout_ms() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_MS
}

/// Default upstream user agent.
fn default_user_agent() -> String {
    format!("weather-loader/{}", env!("CARGO_PKG_VERSION"))
}

/// Default geocoding language.
fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a short, non-empty text setting.
fn validate_short_text(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_SHORT_TEXT_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Validates that a URL setting uses an HTTP scheme and names a host.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::Invalid(format!("{field} must be an http(s) url")))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    if value.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}
