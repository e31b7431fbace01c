// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted sync settings and outcome history.
//!
//! Values are stored as plain strings under the well-known keys in
//! [`vaultline_core::keys`], so any execution context that opens the same
//! store by name reads the same state. Unparseable values fall back to
//! defaults rather than failing the caller.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use vaultline_core::keys;
use vaultline_core::types::clamp_interval;
use vaultline_core::{KeyValueStore, SyncOutcomeHistory, SyncSettings, VaultlineError};

#[derive(Clone)]
pub struct SyncStateStore {
    store: Arc<dyn KeyValueStore>,
}

impl SyncStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load_settings(&self) -> Result<SyncSettings, VaultlineError> {
        let defaults = SyncSettings::default();
        Ok(SyncSettings {
            enabled: self.read(keys::ENABLED).await?.unwrap_or(defaults.enabled),
            interval_minutes: self
                .read::<u32>(keys::INTERVAL)
                .await?
                .map(clamp_interval)
                .unwrap_or(defaults.interval_minutes),
            require_wifi: self
                .read(keys::REQUIRE_WIFI)
                .await?
                .unwrap_or(defaults.require_wifi),
            require_charging: self
                .read(keys::REQUIRE_CHARGING)
                .await?
                .unwrap_or(defaults.require_charging),
        })
    }

    /// Writes all four settings in one batch.
    pub async fn save_settings(&self, settings: &SyncSettings) -> Result<(), VaultlineError> {
        self.store
            .put_many(&[
                (keys::ENABLED, settings.enabled.to_string()),
                (keys::INTERVAL, settings.interval_minutes.to_string()),
                (keys::REQUIRE_WIFI, settings.require_wifi.to_string()),
                (keys::REQUIRE_CHARGING, settings.require_charging.to_string()),
            ])
            .await
    }

    pub async fn load_history(&self) -> Result<SyncOutcomeHistory, VaultlineError> {
        let last_sync = self
            .store
            .get(keys::LAST_SYNC)
            .await?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    warn!(key = keys::LAST_SYNC, value = %raw, error = %e, "ignoring unparseable timestamp");
                    None
                }
            });

        Ok(SyncOutcomeHistory {
            last_sync,
            last_sync_success: self.read(keys::LAST_SYNC_SUCCESS).await?,
            last_sync_error: self
                .store
                .get(keys::LAST_SYNC_ERROR)
                .await?
                .filter(|message| !message.is_empty()),
            consecutive_failures: self
                .read::<i64>(keys::CONSECUTIVE_FAILURES)
                .await?
                .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
                .unwrap_or(0),
        })
    }

    /// Records a successful run and resets the failure counter. Returns the
    /// counter value it replaced.
    ///
    /// The error is cleared by writing it empty in the same batch, so the
    /// outcome keys never disagree after a crash.
    pub async fn record_success(&self, at: DateTime<Utc>) -> Result<u32, VaultlineError> {
        let previous = self.load_history().await?.consecutive_failures;
        self.store
            .put_many(&[
                (keys::LAST_SYNC, at.to_rfc3339()),
                (keys::LAST_SYNC_SUCCESS, true.to_string()),
                (keys::CONSECUTIVE_FAILURES, 0.to_string()),
                (keys::LAST_SYNC_ERROR, String::new()),
            ])
            .await?;
        Ok(previous)
    }

    /// Records a failed run and returns the new consecutive failure count.
    pub async fn record_failure(
        &self,
        at: DateTime<Utc>,
        message: &str,
    ) -> Result<u32, VaultlineError> {
        let failures = self.store.increment(keys::CONSECUTIVE_FAILURES).await?;
        self.store
            .put_many(&[
                (keys::LAST_SYNC, at.to_rfc3339()),
                (keys::LAST_SYNC_SUCCESS, false.to_string()),
                (keys::LAST_SYNC_ERROR, message.to_string()),
            ])
            .await?;
        Ok(u32::try_from(failures.max(0)).unwrap_or(u32::MAX))
    }

    async fn read<T: FromStr>(&self, key: &str) -> Result<Option<T>, VaultlineError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparseable setting");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for SyncStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStateStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_storage::MemoryKeyValueStore;

    /// Every single-key write fails; only batches reach the store.
    struct BatchOnlyStore(MemoryKeyValueStore);

    #[async_trait::async_trait]
    impl KeyValueStore for BatchOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, VaultlineError> {
            self.0.get(key).await
        }

        async fn put(&self, key: &str, _value: &str) -> Result<(), VaultlineError> {
            Err(VaultlineError::Internal(format!("unbatched put of {key}")))
        }

        async fn delete(&self, key: &str) -> Result<(), VaultlineError> {
            Err(VaultlineError::Internal(format!("unbatched delete of {key}")))
        }

        async fn put_many(&self, entries: &[(&str, String)]) -> Result<(), VaultlineError> {
            self.0.put_many(entries).await
        }

        async fn increment(&self, key: &str) -> Result<i64, VaultlineError> {
            self.0.increment(key).await
        }

        async fn keys(&self) -> Result<Vec<String>, VaultlineError> {
            self.0.keys().await
        }
    }

    fn state() -> (SyncStateStore, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        (SyncStateStore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn empty_store_yields_defaults() {
        let (state, _) = state();
        assert_eq!(state.load_settings().await.unwrap(), SyncSettings::default());
        assert_eq!(
            state.load_history().await.unwrap(),
            SyncOutcomeHistory::default()
        );
    }

    #[tokio::test]
    async fn settings_round_trip_under_stable_keys() {
        let (state, store) = state();
        let settings = SyncSettings {
            enabled: true,
            interval_minutes: 30,
            require_wifi: true,
            require_charging: false,
        };
        state.save_settings(&settings).await.unwrap();

        assert_eq!(state.load_settings().await.unwrap(), settings);
        assert_eq!(store.get("interval").await.unwrap().as_deref(), Some("30"));
        assert_eq!(store.get("require_wifi").await.unwrap().as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn out_of_range_interval_is_clamped_on_read() {
        let (state, store) = state();
        store.put(keys::INTERVAL, "1000").await.unwrap();
        assert_eq!(state.load_settings().await.unwrap().interval_minutes, 360);
    }

    #[tokio::test]
    async fn garbage_values_fall_back_to_defaults() {
        let (state, store) = state();
        store.put(keys::ENABLED, "yes please").await.unwrap();
        store.put(keys::CONSECUTIVE_FAILURES, "many").await.unwrap();
        assert!(!state.load_settings().await.unwrap().enabled);
        assert_eq!(state.load_history().await.unwrap().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn failures_accumulate_and_success_resets() {
        let (state, _) = state();
        let now = Utc::now();

        assert_eq!(state.record_failure(now, "boom").await.unwrap(), 1);
        assert_eq!(state.record_failure(now, "boom again").await.unwrap(), 2);
        let history = state.load_history().await.unwrap();
        assert_eq!(history.consecutive_failures, 2);
        assert_eq!(history.last_sync_success, Some(false));
        assert_eq!(history.last_sync_error.as_deref(), Some("boom again"));

        assert_eq!(state.record_success(now).await.unwrap(), 2);
        let history = state.load_history().await.unwrap();
        assert_eq!(history.consecutive_failures, 0);
        assert_eq!(history.last_sync_success, Some(true));
        assert_eq!(history.last_sync_error, None);
        assert_eq!(
            history.last_sync.map(|t| t.timestamp()),
            Some(now.timestamp())
        );
    }

    #[tokio::test]
    async fn success_clears_the_error_in_one_batch() {
        let state = SyncStateStore::new(Arc::new(BatchOnlyStore(MemoryKeyValueStore::new())));
        let now = Utc::now();
        state.record_failure(now, "remote unreachable").await.unwrap();

        assert_eq!(state.record_success(now).await.unwrap(), 1);

        let history = state.load_history().await.unwrap();
        assert_eq!(history.last_sync_success, Some(true));
        assert_eq!(history.last_sync_error, None);
        assert_eq!(history.consecutive_failures, 0);
    }
}
