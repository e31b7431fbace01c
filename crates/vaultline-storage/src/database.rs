// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use vaultline_core::VaultlineError;

use crate::migrations;

/// How long a writer waits for another context's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A migrated SQLite database.
///
/// Cloning is cheap and shares the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode and
    /// applies pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, VaultlineError> {
        Self::open_with(path, true).await
    }

    /// Like [`open`](Self::open) with explicit control over WAL mode.
    pub async fn open_with(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, VaultlineError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| VaultlineError::Storage {
                source: Box::new(e),
            })?;
        }

        // Migrations run on a short-lived blocking connection so that the
        // async connection only ever sees a fully migrated schema.
        let migrate_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), VaultlineError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| VaultlineError::Storage {
                    source: Box::new(e),
                })?;
            apply_pragmas(&conn, wal_mode).map_err(|e| VaultlineError::Storage {
                source: Box::new(e),
            })?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| VaultlineError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| VaultlineError::Storage {
                source: Box::new(e),
            })?;
        conn.call(move |conn| apply_pragmas(conn, wal_mode))
            .await
            .map_err(map_tr_err)?;

        debug!(path = %path.display(), wal_mode, "database opened");
        Ok(Self { conn, path })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoints the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), VaultlineError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    }
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Convert tokio-rusqlite errors to [`VaultlineError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VaultlineError {
    VaultlineError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("nested/vaultline.db"))
            .await
            .unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for table in ["kv_entries", "scheduled_jobs", "vault_entries", "vault_meta"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}");
        }
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaultline.db");
        drop(Database::open(&path).await.unwrap());
        let db = Database::open(&path).await.unwrap();
        db.checkpoint().await.unwrap();
    }
}
