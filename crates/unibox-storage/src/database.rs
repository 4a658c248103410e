// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite database handle built on tokio-rusqlite.
//!
//! All reads and writes go through a single background thread owned by
//! [`tokio_rusqlite::Connection`], which serializes access and avoids
//! SQLITE_BUSY under concurrent async callers. WAL mode keeps readers
//! from blocking the writer.

use tracing::info;
use unibox_core::UniboxError;

/// Map a tokio-rusqlite error into the crate error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> UniboxError {
    UniboxError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the unibox database.
///
/// Cheap to clone; all clones share the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run
    /// all pending migrations.
    pub async fn open(path: &str) -> Result<Self, UniboxError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        conn.call(|conn| -> Result<(), UniboxError> {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA foreign_keys=ON;
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| UniboxError::Storage {
                source: Box::new(e),
            })?;
            crate::migrations::run_migrations(conn).map_err(|e| UniboxError::Storage {
                source: Box::new(e),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| UniboxError::Storage {
            source: Box::new(e),
        })?;

        info!(path, "database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database with migrations applied. Test helper,
    /// but also used by the config `check` path that validates migrations.
    pub async fn open_in_memory() -> Result<Self, UniboxError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        conn.call(|conn| -> Result<(), UniboxError> {
            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| UniboxError::Storage {
                    source: Box::new(e),
                })?;
            crate::migrations::run_migrations(conn).map_err(|e| UniboxError::Storage {
                source: Box::new(e),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| UniboxError::Storage {
            source: Box::new(e),
        })?;

        Ok(Self { conn })
    }

    /// Access the underlying connection for query modules.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the background connection thread.
    pub async fn close(self) -> Result<(), UniboxError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| UniboxError::Storage {
                source: Box::new(e),
            })
    }
}
