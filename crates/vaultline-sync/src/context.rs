// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handles a sync execution context needs, and how they are re-opened.
//!
//! A background job shares no memory with the foreground process. Every
//! run asks a [`ContextLoader`] to open its stores from durable storage by
//! their well-known names; nothing is cached between runs.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use vaultline_config::model::{StorageConfig, SyncConfig};
use vaultline_core::keys;
use vaultline_core::{JobScheduler, KeyValueStore, SyncEngineFactory, VaultlineError};
use vaultline_device::{BatteryMonitor, ConnectivityMonitor};
use vaultline_storage::{Database, SqliteKeyValueStore};
use vaultline_vault::CredentialVault;

use crate::mirror::MirrorEngineFactory;
use crate::state::SyncStateStore;

/// Stores opened once the credential vault is unlocked.
#[derive(Clone)]
pub struct VaultHandles {
    /// Remote token, owner, repository and root key.
    pub credentials: Arc<dyn KeyValueStore>,
    /// Builds the sync component over the local records.
    pub engines: Arc<dyn SyncEngineFactory>,
}

/// Re-opens durable storage for one execution context.
#[async_trait]
pub trait ContextLoader: Send + Sync {
    /// Opens the settings and history store. A failure here cannot be
    /// recorded anywhere and is only logged.
    async fn open_state(&self) -> Result<SyncStateStore, VaultlineError>;

    /// Unlocks the credential vault. A failure is recorded as a failed run.
    async fn open_vault(&self) -> Result<VaultHandles, VaultlineError>;
}

/// Everything a [`SyncScheduler`](crate::SyncScheduler) reads or writes.
#[derive(Clone)]
pub struct SyncContext {
    pub state: SyncStateStore,
    pub vault: VaultHandles,
}

impl SyncContext {
    pub async fn load(loader: &dyn ContextLoader) -> Result<Self, VaultlineError> {
        Ok(Self {
            state: loader.open_state().await?,
            vault: loader.open_vault().await?,
        })
    }
}

/// Process-local services: the platform scheduler and device sensors.
#[derive(Clone)]
pub struct SyncServices {
    pub jobs: Arc<dyn JobScheduler>,
    pub battery: BatteryMonitor,
    pub connectivity: Arc<ConnectivityMonitor>,
}

/// Opens the SQLite database afresh on every call.
///
/// The passphrase is handed in by the caller: a foreground command may have
/// prompted for it, a background execution only ever reads it from the
/// environment. Without one, `open_vault` fails and the run is recorded as
/// failed.
pub struct StorageContextLoader {
    storage: StorageConfig,
    sync: SyncConfig,
    passphrase: Option<SecretString>,
}

impl StorageContextLoader {
    pub fn new(storage: StorageConfig, sync: SyncConfig, passphrase: Option<SecretString>) -> Self {
        Self {
            storage,
            sync,
            passphrase,
        }
    }

    async fn database(&self) -> Result<Database, VaultlineError> {
        Database::open_with(&self.storage.database_path, self.storage.wal_mode).await
    }
}

#[async_trait]
impl ContextLoader for StorageContextLoader {
    async fn open_state(&self) -> Result<SyncStateStore, VaultlineError> {
        let db = self.database().await?;
        Ok(SyncStateStore::new(Arc::new(SqliteKeyValueStore::open(
            &db,
            keys::SYNC_STORE,
        ))))
    }

    async fn open_vault(&self) -> Result<VaultHandles, VaultlineError> {
        let passphrase = self
            .passphrase
            .as_ref()
            .ok_or_else(|| VaultlineError::Vault("vault passphrase not available".to_string()))?;
        let db = self.database().await?;
        let credentials = CredentialVault::unlock(&db, keys::CREDENTIAL_STORE, passphrase).await?;
        let records = credentials.store(keys::RECORD_STORE);
        debug!(path = %self.storage.database_path, "credential vault opened for sync");
        Ok(VaultHandles {
            credentials: Arc::new(credentials),
            engines: Arc::new(MirrorEngineFactory::from_config(&self.sync, Arc::new(records))),
        })
    }
}
