// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`KeyValueStore`], namespaced by store name.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use vaultline_core::{KeyValueStore, VaultlineError};

use crate::database::{Database, map_tr_err};

/// A named store over the shared `kv_entries` table.
///
/// Two handles opened with the same name, in the same or different
/// processes, see the same data.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    db: Database,
    store: String,
}

impl SqliteKeyValueStore {
    pub fn open(db: &Database, store: &str) -> Self {
        Self {
            db: db.clone(),
            store: store.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.store
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultlineError> {
        let store = self.store.clone();
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT value FROM kv_entries WHERE store = ?1 AND key = ?2",
                    params![store, key],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), VaultlineError> {
        self.put_many(&[(key, value.to_string())]).await
    }

    async fn delete(&self, key: &str) -> Result<(), VaultlineError> {
        let store = self.store.clone();
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM kv_entries WHERE store = ?1 AND key = ?2",
                    params![store, key],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn put_many(&self, entries: &[(&str, String)]) -> Result<(), VaultlineError> {
        let store = self.store.clone();
        let entries: Vec<(String, String)> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO kv_entries (store, key, value) VALUES (?1, ?2, ?3)
                         ON CONFLICT (store, key) DO UPDATE SET
                            value = excluded.value,
                            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    )?;
                    for (key, value) in &entries {
                        stmt.execute(params![store, key, value])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn increment(&self, key: &str) -> Result<i64, VaultlineError> {
        let store = self.store.clone();
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "INSERT INTO kv_entries (store, key, value) VALUES (?1, ?2, '1')
                     ON CONFLICT (store, key) DO UPDATE SET
                        value = CAST(CAST(kv_entries.value AS INTEGER) + 1 AS TEXT),
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     RETURNING CAST(value AS INTEGER)",
                    params![store, key],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    async fn keys(&self) -> Result<Vec<String>, VaultlineError> {
        let store = self.store.clone();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT key FROM kv_entries WHERE store = ?1 ORDER BY key")?;
                let rows = stmt.query_map(params![store], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("kv.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn stores_are_namespaced() {
        let (_dir, db) = open_db().await;
        let a = SqliteKeyValueStore::open(&db, "a");
        let b = SqliteKeyValueStore::open(&db, "b");

        a.put("enabled", "true").await.unwrap();
        assert_eq!(a.get("enabled").await.unwrap().as_deref(), Some("true"));
        assert_eq!(b.get("enabled").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_and_delete_is_idempotent() {
        let (_dir, db) = open_db().await;
        let store = SqliteKeyValueStore::open(&db, "s");

        store.put("interval", "30").await.unwrap();
        store.put("interval", "45").await.unwrap();
        assert_eq!(store.get("interval").await.unwrap().as_deref(), Some("45"));

        store.delete("interval").await.unwrap();
        store.delete("interval").await.unwrap();
        assert_eq!(store.get("interval").await.unwrap(), None);
    }

    #[tokio::test]
    async fn increment_starts_at_one_and_counts() {
        let (_dir, db) = open_db().await;
        let store = SqliteKeyValueStore::open(&db, "s");

        assert_eq!(store.increment("failures").await.unwrap(), 1);
        assert_eq!(store.increment("failures").await.unwrap(), 2);
        assert_eq!(store.increment("failures").await.unwrap(), 3);
        assert_eq!(store.get("failures").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn increment_resumes_from_written_value() {
        let (_dir, db) = open_db().await;
        let store = SqliteKeyValueStore::open(&db, "s");

        store.put("failures", "0").await.unwrap();
        assert_eq!(store.increment("failures").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_handle_sees_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");

        let foreground = Database::open(&path).await.unwrap();
        SqliteKeyValueStore::open(&foreground, "sync")
            .put_many(&[("enabled", "true".into()), ("interval", "30".into())])
            .await
            .unwrap();

        let background = Database::open(&path).await.unwrap();
        let store = SqliteKeyValueStore::open(&background, "sync");
        assert_eq!(store.keys().await.unwrap(), vec!["enabled", "interval"]);
    }
}
