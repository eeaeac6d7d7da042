use crate::error::{TrackerError, TrackerResult};
use chrono::Utc;
use rusqlite::Error::InvalidParameterName;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Log IO-related DB errors for easier diagnosis (disk full, permission denied).
/// Does not change error propagation, the caller still returns Err.
pub(crate) fn log_io_error_if_any(context: &str, e: &rusqlite::Error) {
    use rusqlite::ffi::ErrorCode;
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = e {
        match ffi_err.code {
            ErrorCode::DiskFull => {
                error!(
                    "[DB] {}: Disk full. Free space on drive or check the data directory.",
                    context
                );
            }
            ErrorCode::ReadOnly | ErrorCode::CannotOpen => {
                error!(
                    "[DB] {}: Permission denied or read-only. Check the data directory is writable.",
                    context
                );
            }
            ErrorCode::SystemIoFailure => {
                error!("[DB] {}: I/O error. Check disk and permissions.", context);
            }
            _ => {}
        }
    }
}

/// SQLite-backed key/value storage: `local_storage` for serialized documents
/// and `app_meta` for small settings.
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Poison-tolerant lock: a panic while holding the connection is reported
    /// as an error instead of propagating.
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, rusqlite::Error> {
        self.conn.lock().map_err(|e| {
            InvalidParameterName(format!(
                "Database mutex poisoned: {}. A panic occurred while holding the lock.",
                e
            ))
        })
    }

    pub fn new(db_path: impl AsRef<Path>) -> SqliteResult<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        Self::init(conn, true)
    }

    /// Non-persistent database, used when no data directory is available.
    pub fn in_memory() -> SqliteResult<Self> {
        Self::init(Connection::open_in_memory()?, false)
    }

    fn init(conn: Connection, on_disk: bool) -> SqliteResult<Self> {
        let integrity: String = conn
            .query_row("PRAGMA integrity_check", [], |r| r.get(0))
            .map_err(|e| InvalidParameterName(format!("Integrity check failed: {}", e)))?;
        if !integrity.eq_ignore_ascii_case("ok") {
            return Err(InvalidParameterName(format!(
                "Database corruption detected: {}",
                integrity
            )));
        }

        if on_disk {
            if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
                warn!(
                    "[DB] Failed to enable WAL mode: {}. Continuing with default journal mode.",
                    e
                );
            }
        }
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "temp_store", "MEMORY");

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Opens `db_path`, moving a corrupted file aside to
    /// `<file>.corrupted.<unix-ts>` and starting fresh if needed.
    pub fn open_or_recover(db_path: impl AsRef<Path>) -> TrackerResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        match Self::new(db_path) {
            Ok(db) => Ok(db),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                let is_corruption = err_str.contains("corrupt")
                    || err_str.contains("integrity")
                    || err_str.contains("not a database");
                if !is_corruption || !db_path.exists() {
                    return Err(TrackerError::Database(e));
                }
                let mut backup = db_path.as_os_str().to_owned();
                backup.push(format!(".corrupted.{}", Utc::now().timestamp()));
                let backup_path = PathBuf::from(backup);
                std::fs::rename(db_path, &backup_path).map_err(|rename_e| {
                    warn!(
                        "[DB] Failed to rename corrupted DB to {:?}: {}",
                        backup_path, rename_e
                    );
                    TrackerError::Database(e)
                })?;
                info!(
                    "[DB] Corrupted DB backed up to {:?}, starting fresh",
                    backup_path
                );
                Ok(Self::new(db_path)?)
            }
        }
    }

    /// Current schema version (PRAGMA user_version). Bump when adding migrations.
    const SCHEMA_VERSION: i32 = 1;

    fn run_migrations(&self) -> SqliteResult<()> {
        let conn = self.lock_conn()?;
        let current: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

        if current < 1 {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
                [],
            )?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS app_meta (key TEXT PRIMARY KEY, value TEXT)",
                [],
            )?;
        }

        conn.pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;
        Ok(())
    }

    pub fn get_storage_item(&self, key: &str) -> SqliteResult<Option<String>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT value FROM local_storage WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    /// Replaces the value under `key` atomically. A failed write leaves the
    /// previous value in place.
    pub fn set_storage_item(&self, key: &str, value: &str) -> SqliteResult<()> {
        let conn = self.lock_conn()?;
        let now = Utc::now().timestamp();

        conn.execute("BEGIN IMMEDIATE TRANSACTION", []).map_err(|e| {
            log_io_error_if_any("set_storage_item begin", &e);
            error!("[DB] Failed to begin transaction: {}", e);
            e
        })?;

        let result = conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now],
        );

        match result {
            Ok(_) => {
                conn.execute("COMMIT", []).map_err(|e| {
                    log_io_error_if_any("set_storage_item commit", &e);
                    error!("[DB] Failed to commit transaction: {}", e);
                    let _ = conn.execute("ROLLBACK", []);
                    e
                })?;
                Ok(())
            }
            Err(e) => {
                log_io_error_if_any("set_storage_item", &e);
                error!("[DB] Failed to write {}: {}. Rolling back transaction.", key, e);
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    pub fn remove_storage_item(&self, key: &str) -> SqliteResult<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn get_app_meta(&self, key: &str) -> SqliteResult<Option<String>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map(Option::flatten)
    }

    pub fn set_app_meta(&self, key: &str, value: &str) -> SqliteResult<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_app_meta(&self, key: &str) -> SqliteResult<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM app_meta WHERE key = ?1", params![key])?;
        Ok(())
    }
}
