// crates/weather-loader-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Pipeline Store
// Description: Durable PipelineStore backed by SQLite.
// Purpose: Persist queue entries, measurements, and dead letters.
// Dependencies: weather-loader-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! Three tables hold the pipeline state: `queue_messages`,
//! `weather_measurements`, and `queue_deadletter`, plus `store_meta` for the
//! schema version. Claims are a single compare-and-set statement; completing
//! or dead-lettering an entry deletes it in the same immediate transaction
//! that writes its destination row. A busy or locked database surfaces as
//! [`StoreError::Unavailable`] once the busy timeout elapses.
//! Security posture: database contents are untrusted; rows are validated on
//! read and fail closed as [`SqliteStoreError::Corrupt`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use weather_loader_core::DeadLetterEntry;
use weather_loader_core::DeadLetterStore;
use weather_loader_core::MeasurementStore;
use weather_loader_core::NewMeasurement;
use weather_loader_core::QueueEntry;
use weather_loader_core::QueueEntryId;
use weather_loader_core::QueueStatus;
use weather_loader_core::QueueStore;
use weather_loader_core::StoreError;
use weather_loader_core::StoredMeasurement;
use weather_loader_core::unix_millis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 8_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Columns selected for queue rows.
const QUEUE_COLUMNS: &str = "id, status, attempts, created_at, locked_at, payload_json";
/// Columns selected for measurement rows.
const MEASUREMENT_COLUMNS: &str =
    "id, measurement, location, value, ts, checksum, inserted_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` pipeline store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a configuration with default tuning for the given path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Database stayed busy or locked past the busy timeout.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Stored row fails validation.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store request or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Busy(message) => Self::Unavailable(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Busy(error.to_string())
            }
            _ => Self::Db(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed pipeline store.
///
/// # Invariants
/// - A single connection is shared per instance behind a mutex; separate
///   instances (or processes) coordinate through `SQLite` locking.
#[derive(Debug, Clone)]
pub struct SqlitePipelineStore {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePipelineStore {
    /// Opens an `SQLite`-backed pipeline store, creating tables when needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or when its schema version is unsupported.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }

    /// Loads up to `limit` queue rows using the given filter and ordering.
    fn query_queue(
        &self,
        clause: &str,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, SqliteStoreError> {
        let guard = self.lock()?;
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM queue_messages {clause} LIMIT ?1");
        let mut stmt = guard.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], QueueRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(guard);
        rows.into_iter().map(QueueRow::into_entry).collect()
    }

    /// Deletes a `PROCESSING` entry inside an open transaction.
    fn delete_processing(
        tx: &rusqlite::Transaction<'_>,
        id: QueueEntryId,
    ) -> Result<(), SqliteStoreError> {
        let deleted = tx.execute(
            "DELETE FROM queue_messages WHERE id = ?1 AND status = ?2",
            params![id.get(), QueueStatus::Processing.as_str()],
        )?;
        if deleted == 0 {
            return Err(SqliteStoreError::Invalid(format!(
                "queue entry {id} is not processing"
            )));
        }
        Ok(())
    }

    /// Inserts a measurement row inside an open connection or transaction.
    fn insert_measurement(
        connection: &Connection,
        measurement: &NewMeasurement,
    ) -> Result<StoredMeasurement, SqliteStoreError> {
        let inserted_at = unix_millis();
        connection.execute(
            "INSERT INTO weather_measurements
                (measurement, location, value, ts, checksum, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                measurement.measurement,
                measurement.location,
                measurement.value,
                measurement.timestamp,
                measurement.checksum,
                inserted_at
            ],
        )?;
        Ok(StoredMeasurement::from_new(
            connection.last_insert_rowid(),
            measurement.clone(),
            inserted_at,
        ))
    }

    /// Runs the resolution closure in an immediate transaction.
    fn resolve<T>(
        &self,
        apply: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = apply(&tx)?;
        tx.commit()?;
        drop(guard);
        Ok(value)
    }
}

impl QueueStore for SqlitePipelineStore {
    fn enqueue(&self, payload: &str) -> Result<QueueEntry, StoreError> {
        let guard = self.lock()?;
        let created_at = unix_millis();
        guard
            .execute(
                "INSERT INTO queue_messages (status, attempts, created_at, locked_at, \
                 payload_json) VALUES (?1, 0, ?2, NULL, ?3)",
                params![QueueStatus::New.as_str(), created_at, payload],
            )
            .map_err(SqliteStoreError::from)?;
        let id = guard.last_insert_rowid();
        drop(guard);
        Ok(QueueEntry {
            id: QueueEntryId::new(id),
            status: QueueStatus::New,
            attempts: 0,
            created_at,
            locked_at: None,
            payload: payload.to_string(),
        })
    }

    fn pending(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self.query_queue("WHERE status = 'NEW' ORDER BY id ASC", limit)?)
    }

    fn claim(&self, id: QueueEntryId, locked_at: i64) -> Result<Option<QueueEntry>, StoreError> {
        let guard = self.lock()?;
        let sql = format!(
            "UPDATE queue_messages
                SET status = ?2, attempts = attempts + 1, locked_at = ?3
              WHERE id = ?1 AND status = ?4
              RETURNING {QUEUE_COLUMNS}"
        );
        let row = guard
            .query_row(
                &sql,
                params![
                    id.get(),
                    QueueStatus::Processing.as_str(),
                    locked_at,
                    QueueStatus::New.as_str()
                ],
                QueueRow::from_row,
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        drop(guard);
        Ok(row.map(QueueRow::into_entry).transpose()?)
    }

    fn release(&self, id: QueueEntryId) -> Result<bool, StoreError> {
        let guard = self.lock()?;
        let updated = guard
            .execute(
                "UPDATE queue_messages SET status = ?2, locked_at = NULL
                  WHERE id = ?1 AND status = ?3",
                params![id.get(), QueueStatus::New.as_str(), QueueStatus::Processing.as_str()],
            )
            .map_err(SqliteStoreError::from)?;
        drop(guard);
        Ok(updated == 1)
    }

    fn complete(
        &self,
        id: QueueEntryId,
        measurement: &NewMeasurement,
    ) -> Result<StoredMeasurement, StoreError> {
        Ok(self.resolve(|tx| {
            Self::delete_processing(tx, id)?;
            Self::insert_measurement(tx, measurement)
        })?)
    }

    fn dead_letter(
        &self,
        id: QueueEntryId,
        payload: &str,
        error_message: &str,
    ) -> Result<DeadLetterEntry, StoreError> {
        Ok(self.resolve(|tx| {
            Self::delete_processing(tx, id)?;
            let created_at = unix_millis();
            tx.execute(
                "INSERT INTO queue_deadletter (payload_json, error_message, created_at)
                 VALUES (?1, ?2, ?3)",
                params![payload, error_message, created_at],
            )?;
            Ok(DeadLetterEntry {
                id: tx.last_insert_rowid(),
                payload: payload.to_string(),
                error_message: error_message.to_string(),
                created_at,
            })
        })?)
    }

    fn reclaim_stale(&self, locked_before: i64) -> Result<usize, StoreError> {
        let guard = self.lock()?;
        let updated = guard
            .execute(
                "UPDATE queue_messages SET status = ?1, locked_at = NULL
                  WHERE status = ?2 AND locked_at IS NOT NULL AND locked_at < ?3",
                params![QueueStatus::New.as_str(), QueueStatus::Processing.as_str(), locked_before],
            )
            .map_err(SqliteStoreError::from)?;
        drop(guard);
        Ok(updated)
    }

    fn get(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, StoreError> {
        let guard = self.lock()?;
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM queue_messages WHERE id = ?1");
        let row = guard
            .query_row(&sql, params![id.get()], QueueRow::from_row)
            .optional()
            .map_err(SqliteStoreError::from)?;
        drop(guard);
        Ok(row.map(QueueRow::into_entry).transpose()?)
    }

    fn recent_entries(&self, limit: usize) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self.query_queue("ORDER BY id DESC", limit)?)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(SqliteStoreError::from)?;
        drop(guard);
        Ok(())
    }
}

impl MeasurementStore for SqlitePipelineStore {
    fn append(&self, measurement: &NewMeasurement) -> Result<StoredMeasurement, StoreError> {
        let guard = self.lock()?;
        let stored = Self::insert_measurement(&guard, measurement)?;
        drop(guard);
        Ok(stored)
    }

    fn recent_measurements(&self, limit: usize) -> Result<Vec<StoredMeasurement>, StoreError> {
        let guard = self.lock()?;
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM weather_measurements ORDER BY id DESC LIMIT ?1"
        );
        let mut stmt = guard.prepare(&sql).map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], |row| {
                Ok(StoredMeasurement {
                    id: row.get(0)?,
                    measurement: row.get(1)?,
                    location: row.get(2)?,
                    value: row.get(3)?,
                    timestamp: row.get(4)?,
                    checksum: row.get(5)?,
                    inserted_at: row.get(6)?,
                })
            })
            .map_err(SqliteStoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(SqliteStoreError::from)?;
        Ok(rows)
    }
}

impl DeadLetterStore for SqlitePipelineStore {
    fn recent_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, payload_json, error_message, created_at
                   FROM queue_deadletter ORDER BY id DESC LIMIT ?1",
            )
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], |row| {
                Ok(DeadLetterEntry {
                    id: row.get(0)?,
                    payload: row.get(1)?,
                    error_message: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(SqliteStoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(SqliteStoreError::from)?;
        Ok(rows)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw queue row before validation.
struct QueueRow {
    /// Row identifier.
    id: i64,
    /// Status label.
    status: String,
    /// Attempt counter.
    attempts: i64,
    /// Enqueue time.
    created_at: i64,
    /// Claim time.
    locked_at: Option<i64>,
    /// Payload JSON.
    payload: String,
}

impl QueueRow {
    /// Reads a row selected with [`QUEUE_COLUMNS`].
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            status: row.get(1)?,
            attempts: row.get(2)?,
            created_at: row.get(3)?,
            locked_at: row.get(4)?,
            payload: row.get(5)?,
        })
    }

    /// Validates the raw row into a queue entry.
    fn into_entry(self) -> Result<QueueEntry, SqliteStoreError> {
        let status = QueueStatus::parse(&self.status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("queue entry {} has unknown status", self.id))
        })?;
        let attempts = u32::try_from(self.attempts).map_err(|_| {
            SqliteStoreError::Corrupt(format!("queue entry {} has invalid attempts", self.id))
        })?;
        Ok(QueueEntry {
            id: QueueEntryId::new(self.id),
            status,
            attempts,
            created_at: self.created_at,
            locked_at: self.locked_at,
            payload: self.payload,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a row limit into an `SQLite` integer.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability and bounded waits.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS queue_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    status TEXT NOT NULL CHECK (status IN ('NEW', 'PROCESSING')),
                    attempts INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    locked_at INTEGER,
                    payload_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_queue_messages_status
                    ON queue_messages (status, id);
                CREATE TABLE IF NOT EXISTS weather_measurements (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    measurement TEXT NOT NULL,
                    location TEXT NOT NULL,
                    value REAL NOT NULL,
                    ts TEXT NOT NULL,
                    checksum TEXT NOT NULL,
                    inserted_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS queue_deadletter (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    payload_json TEXT NOT NULL,
                    error_message TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}
