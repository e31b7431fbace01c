// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote object store and sync component traits.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::VaultlineError;
use crate::types::{SyncCredentials, SyncReport};

/// A byte-blob store keyed by slash-separated path.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// Creates or replaces the file at `path`, returning the commit id.
    async fn upload_file(&self, path: &str, bytes: &[u8]) -> Result<String, VaultlineError>;

    /// Returns `None` when nothing exists at `path`.
    async fn download_file(&self, path: &str) -> Result<Option<Vec<u8>>, VaultlineError>;

    /// Lists file names (not full paths) directly under `dir`. A missing
    /// directory lists as empty.
    async fn list_files(&self, dir: &str) -> Result<Vec<String>, VaultlineError>;

    async fn delete_file(&self, path: &str) -> Result<(), VaultlineError>;

    /// Whether the configured repository exists and is reachable with the
    /// configured token.
    async fn verify_repository(&self) -> Result<bool, VaultlineError>;
}

/// One synchronization pass against the remote store.
#[async_trait]
pub trait SyncEngine: Send {
    async fn initialize(&mut self) -> Result<(), VaultlineError>;

    async fn sync(&mut self) -> Result<SyncReport, VaultlineError>;

    /// Releases network clients and other resources. Called even when
    /// `initialize` or `sync` failed.
    async fn dispose(&mut self) -> Result<(), VaultlineError>;
}

/// Builds a sync component from credentials loaded in the current context.
#[async_trait]
pub trait SyncEngineFactory: Send + Sync {
    async fn create(
        &self,
        credentials: SyncCredentials,
        root_key: SecretString,
    ) -> Result<Box<dyn SyncEngine>, VaultlineError>;
}
