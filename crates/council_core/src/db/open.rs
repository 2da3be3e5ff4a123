//! Opening the record database.
//!
//! # Invariants
//! - Returned connections enforce foreign keys (record cascades rely on it).
//! - File databases run in WAL mode.
//! - Returned connections are fully migrated.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a record database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    File(PathBuf),
    Memory,
}

impl Display for DbTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_) => f.write_str("file"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

impl DbTarget {
    /// Opens, configures and migrates a connection to this target.
    pub fn open(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode={self}");

        match self.connect().and_then(|mut conn| {
            self.configure(&mut conn)?;
            Ok(conn)
        }) {
            Ok(conn) => {
                info!(
                    "event=db_open module=db status=ok mode={self} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={self} duration_ms={} error_code={} error={err}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    fn connect(&self) -> DbResult<Connection> {
        match self {
            Self::File(path) => {
                prepare_parent_dir(path)?;
                Ok(Connection::open(path)?)
            }
            Self::Memory => Ok(Connection::open_in_memory()?),
        }
    }

    fn configure(&self, conn: &mut Connection) -> DbResult<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if let Self::File(_) = self {
            conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
        }
        apply_migrations(conn)
    }
}

fn prepare_parent_dir(path: &Path) -> DbResult<()> {
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|err| DbError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
        None => Ok(()),
    }
}

/// Opens the database file at `path`, creating it and its directory if
/// missing.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    DbTarget::File(path.as_ref().to_path_buf()).open()
}

/// Opens a private in-memory database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    DbTarget::Memory.open()
}
