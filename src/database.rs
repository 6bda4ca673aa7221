// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local database handle.
//!
//! A [`Database`] is the product of the assembler: the expanded path, the
//! engine settings the replication engine reads, the attached replicas, and
//! an SQLite connection pool used to serve actor requests.
//!
//! # Concurrency
//!
//! The pool is shared by every in-flight request. There is no
//! application-level lock: isolation comes from SQLite transactions, and
//! writers contend on SQLite's own lock.
//!
//! # SQLite Busy Handling
//!
//! SQLite can return SQLITE_BUSY/SQLITE_LOCKED under write contention (the
//! replication engine checkpoints the same file). Statements and checkpoints
//! are retried with exponential backoff:
//! - 10ms base delay, doubled per attempt, capped at 500ms
//! - at most 5 attempts
//!
//! A failed `execute` attempt is rolled back before it is retried, so a retry
//! never applies a statement twice.

use crate::error::{ProviderError, Result};
use crate::metrics;
use crate::replica::Replica;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use libsqlite3_sys as ffi;
use sqlx::{Row, TypeInfo, ValueRef};
use std::ffi::{c_char, c_int, CStr};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default interval between WAL change checks.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);
/// Default interval between forced checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);
/// Default WAL page count that triggers a passive checkpoint.
pub const DEFAULT_MIN_CHECKPOINT_PAGE_COUNT: u32 = 1000;
/// Default WAL page count that forces a truncating checkpoint.
pub const DEFAULT_MAX_CHECKPOINT_PAGE_COUNT: u32 = 10_000;

/// Configuration for SQLite busy retry behavior
const SQLITE_RETRY_MAX_ATTEMPTS: u32 = 5;
const SQLITE_RETRY_BASE_DELAY_MS: u64 = 10;
const SQLITE_RETRY_MAX_DELAY_MS: u64 = 500;

/// Check if an error is a retryable SQLite busy/locked error
fn is_sqlite_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: SQLITE_BUSY = 5, SQLITE_LOCKED = 6
            if let Some(code) = db_err.code() {
                return code == "5" || code == "6";
            }
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Execute a database operation with retry on SQLITE_BUSY/SQLITE_LOCKED
async fn execute_with_retry<F, Fut, T>(operation_name: &str, mut f: F) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    let mut delay_ms = SQLITE_RETRY_BASE_DELAY_MS;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts,
                        "SQLite operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if is_sqlite_busy_error(&e) && attempts < SQLITE_RETRY_MAX_ATTEMPTS => {
                warn!(
                    operation = operation_name,
                    attempts,
                    max_attempts = SQLITE_RETRY_MAX_ATTEMPTS,
                    delay_ms,
                    "SQLite busy, retrying"
                );
                metrics::record_sqlite_retry(operation_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(SQLITE_RETRY_MAX_DELAY_MS);
            }
            Err(e) => {
                if is_sqlite_busy_error(&e) {
                    warn!(
                        operation = operation_name,
                        attempts,
                        "SQLite busy, max retries exceeded"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Names and declared types of the result columns of the first statement in `sql`.
///
/// sqlx only exposes normalized storage types, so the statement is prepared
/// directly on the connection to read `sqlite3_column_decltype`.
fn declared_columns(db: NonNull<ffi::sqlite3>, sql: &str) -> Result<Vec<ColumnInfo>> {
    let len = c_int::try_from(sql.len())
        .map_err(|_| ProviderError::Internal("statement too long to describe".to_string()))?;
    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: `db` is an open connection held under its lock for this call,
    // and SQLite reads at most `len` bytes of `sql`.
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db.as_ptr(),
            sql.as_ptr().cast::<c_char>(),
            len,
            &mut stmt,
            ptr::null_mut(),
        )
    };
    if rc != ffi::SQLITE_OK {
        // SAFETY: errmsg is a NUL-terminated string owned by the connection.
        let message = unsafe { c_text(ffi::sqlite3_errmsg(db.as_ptr())) };
        return Err(ProviderError::Internal(format!(
            "failed to describe statement: {}",
            message
        )));
    }
    // Blank or comment-only input prepares to no statement
    if stmt.is_null() {
        return Ok(Vec::new());
    }

    // SAFETY: `stmt` stays valid until finalized below, and every string is
    // copied out before that.
    let columns = unsafe {
        (0..ffi::sqlite3_column_count(stmt))
            .map(|i| ColumnInfo {
                name: c_text(ffi::sqlite3_column_name(stmt, i)),
                db_type: c_text(ffi::sqlite3_column_decltype(stmt, i)).to_lowercase(),
            })
            .collect()
    };

    // SAFETY: `stmt` came from a successful prepare and is finalized once.
    unsafe {
        ffi::sqlite3_finalize(stmt);
    }
    Ok(columns)
}

/// Copy a C string, mapping null to the empty string.
///
/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated string.
unsafe fn c_text(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Engine settings applied to a database before it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub monitor_interval: Duration,
    pub checkpoint_interval: Duration,
    pub min_checkpoint_page_count: u32,
    pub max_checkpoint_page_count: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            min_checkpoint_page_count: DEFAULT_MIN_CHECKPOINT_PAGE_COUNT,
            max_checkpoint_page_count: DEFAULT_MAX_CHECKPOINT_PAGE_COUNT,
        }
    }
}

/// Column metadata returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type, lower-cased (e.g. "integer", "text").
    #[serde(rename = "dbType")]
    pub db_type: String,
}

/// A single SQLite value.
///
/// Decoding is untagged and tries variants in order: `Blob` sits before
/// `Text` so a msgpack `bin` is never read back as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Blob(#[serde(with = "serde_bin")] Vec<u8>),
    Text(String),
}

impl SqlValue {
    fn from_row(row: &SqliteRow, index: usize) -> std::result::Result<Self, sqlx::Error> {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Self::Null);
        }
        let storage = raw.type_info().name().to_ascii_uppercase();
        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => Self::Integer(row.try_get(index)?),
            "REAL" => Self::Real(row.try_get(index)?),
            "BLOB" => Self::Blob(row.try_get(index)?),
            _ => Self::Text(row.try_get(index)?),
        };
        Ok(value)
    }
}

/// Byte strings go over the wire as msgpack `bin`, not as an array of integers.
pub(crate) mod serde_bin {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a byte string")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
                Ok(v)
            }
        }

        deserializer.deserialize_byte_buf(Visitor)
    }
}

/// Fully materialized query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// A local database with its replicas.
pub struct Database {
    path: PathBuf,
    pub settings: EngineSettings,
    pub replicas: Vec<Replica>,
    max_connections: u32,
    pool: Option<SqlitePool>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("settings", &self.settings)
            .field("replicas", &self.replicas)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// Create an unopened handle for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: EngineSettings::default(),
            replicas: Vec::new(),
            max_connections: 4,
            pool: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_max_connections(&mut self, max_connections: u32) {
        self.max_connections = max_connections.max(1);
    }

    pub fn is_open(&self) -> bool {
        self.pool.as_ref().is_some_and(|pool| !pool.is_closed())
    }

    /// Open the connection pool.
    ///
    /// The file must already exist. WAL journaling is enabled because the
    /// replication engine ships WAL frames.
    pub async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(ProviderError::InvalidState {
                expected: "closed".to_string(),
                actual: "open".to_string(),
            });
        }

        let path_str = self.path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening database");

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(|source| ProviderError::DatabaseOpen {
                path: path_str.clone(),
                source,
            })?;

        self.pool = Some(pool);
        info!(path = %path_str, replicas = self.replicas.len(), "Database opened");
        Ok(())
    }

    fn pool(&self) -> Result<&SqlitePool> {
        match &self.pool {
            Some(pool) if !pool.is_closed() => Ok(pool),
            _ => Err(ProviderError::InvalidState {
                expected: "open".to_string(),
                actual: "closed".to_string(),
            }),
        }
    }

    /// Run a statement in its own transaction and return the affected row count.
    ///
    /// The transaction commits only if the statement succeeds.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let pool = self.pool()?;
        let sql = sql.trim();

        let rows_affected = execute_with_retry("execute", || {
            let pool = pool.clone();
            async move {
                let mut tx = pool.begin().await?;
                let result = sqlx::query(sql).execute(&mut *tx).await?;
                tx.commit().await?;
                Ok(result.rows_affected())
            }
        })
        .await?;

        Ok(rows_affected)
    }

    /// Run a read query and materialize every row.
    ///
    /// Column types are the declared types from the table schema,
    /// lower-cased. Expression columns have none and report an empty string.
    pub async fn query(&self, sql: &str) -> Result<QueryOutput> {
        let pool = self.pool()?;
        let sql = sql.trim();

        let fetched = execute_with_retry("query", || {
            let pool = pool.clone();
            async move { sqlx::query(sql).fetch_all(&pool).await }
        })
        .await?;

        let mut conn = pool.acquire().await?;
        let columns = {
            let mut handle = conn.lock_handle().await?;
            declared_columns(handle.as_raw_handle(), sql)?
        };

        let mut rows = Vec::with_capacity(fetched.len());
        for row in &fetched {
            let values = (0..row.len())
                .map(|i| SqlValue::from_row(row, i))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.push(values);
        }

        Ok(QueryOutput { columns, rows })
    }

    /// Force flush WAL to the main database file.
    pub async fn checkpoint(&self) -> Result<()> {
        let pool = self.pool()?;

        execute_with_retry("checkpoint", || {
            let pool = pool.clone();
            async move {
                sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                    .execute(&pool)
                    .await
            }
        })
        .await?;

        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the pool.
    ///
    /// Safe to call on an unopened or already closed handle. Requests issued
    /// afterwards fail with [`ProviderError::InvalidState`].
    pub async fn close(&self) {
        let Ok(pool) = self.pool() else {
            return;
        };
        if let Err(e) = self.checkpoint().await {
            warn!(error = %e, "Failed to checkpoint WAL on close");
        }
        pool.close().await;
        info!(path = %self.path.display(), "Database closed");
    }
}
