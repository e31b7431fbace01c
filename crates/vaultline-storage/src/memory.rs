// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`KeyValueStore`] for ephemeral state and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vaultline_core::{KeyValueStore, VaultlineError};

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, VaultlineError> {
        self.entries
            .lock()
            .map_err(|_| VaultlineError::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultlineError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), VaultlineError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), VaultlineError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn put_many(&self, entries: &[(&str, String)]) -> Result<(), VaultlineError> {
        let mut map = self.lock()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, VaultlineError> {
        let mut map = self.lock()?;
        let current = map
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        map.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn keys(&self) -> Result<Vec<String>, VaultlineError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_treats_garbage_as_zero() {
        let store = MemoryKeyValueStore::new();
        store.put("n", "not-a-number").await.unwrap();
        assert_eq!(store.increment("n").await.unwrap(), 1);
    }
}
