//! SQLite persistence outside the engine.
//!
//! Keeps two tables in a local database:
//! - scans: one summary row per completed scan (see `history`)
//! - settings: small key/value pairs such as the remembered export directory
//!
//! The engine itself never reads from here; the CLI uses it to fill in
//! defaults and to list past results.

pub mod history;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

pub use history::ScanRecord;

const DIRECTORY_KEY: &str = "directory";
const MAX_FILES_KEY: &str = "max_files";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not determine data directory")]
    NoDataDir,

    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// `<data dir>/rollwatch/rollwatch.db`
fn default_db_path() -> Result<PathBuf, StoreError> {
    let data_dir = directories::ProjectDirs::from("", "", "rollwatch")
        .ok_or(StoreError::NoDataDir)?
        .data_dir()
        .to_path_buf();

    std::fs::create_dir_all(&data_dir).map_err(|source| StoreError::CreateDir {
        path: data_dir.clone(),
        source,
    })?;
    Ok(data_dir.join("rollwatch.db"))
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            source TEXT NOT NULL,
            current_name TEXT,
            previous_name TEXT,
            current_shift TEXT,
            generated INTEGER,
            consumed INTEGER,
            open_balance INTEGER NOT NULL,
            files_seen INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scans_timestamp ON scans(timestamp)",
        [],
    )?;

    Ok(())
}

/// Database handle. Open once per command, reuse across all operations.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&default_db_path()?)
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Remember the export directory for runs that do not name one.
    pub fn save_directory(&self, dir: &Path) -> Result<(), StoreError> {
        self.set_setting(DIRECTORY_KEY, &dir.to_string_lossy())
    }

    pub fn saved_directory(&self) -> Result<Option<PathBuf>, StoreError> {
        Ok(self.setting(DIRECTORY_KEY)?.map(PathBuf::from))
    }

    pub fn save_max_files(&self, max_files: usize) -> Result<(), StoreError> {
        self.set_setting(MAX_FILES_KEY, &max_files.to_string())
    }

    /// Unparseable stored values read as unset.
    pub fn saved_max_files(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.setting(MAX_FILES_KEY)?.and_then(|v| v.parse().ok()))
    }
}
