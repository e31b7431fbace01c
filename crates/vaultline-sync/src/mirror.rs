// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mirror sync component.
//!
//! Each local record `name -> value` is stored remotely as one sealed file
//! under the records directory. The file name is the hex SHA-256 of the
//! record name, so remote listings reveal nothing about record names. A
//! pass pushes records the remote lacks, pulls records the local store
//! lacks, and counts records present on both sides with different values as
//! conflicts. Conflicts are reported, never resolved.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use vaultline_config::model::SyncConfig;
use vaultline_core::{
    KeyValueStore, RemoteObjectStore, SyncCredentials, SyncEngine, SyncEngineFactory, SyncReport,
    VaultlineError,
};
use vaultline_vault::RootKey;

use crate::remote::GithubObjectStore;

const RECORD_SUFFIX: &str = ".json";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct SealedRecord {
    name: String,
    value: String,
}

pub struct MirrorSyncEngine {
    remote: Arc<dyn RemoteObjectStore>,
    local: Arc<dyn KeyValueStore>,
    root_key: RootKey,
    records_dir: String,
    initialized: bool,
}

impl MirrorSyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteObjectStore>,
        local: Arc<dyn KeyValueStore>,
        root_key: RootKey,
        records_dir: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            local,
            root_key,
            records_dir: records_dir.into().trim_matches('/').to_string(),
            initialized: false,
        }
    }

    fn file_name(record_name: &str) -> String {
        format!("{}{RECORD_SUFFIX}", hex::encode(Sha256::digest(record_name.as_bytes())))
    }

    fn path(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.records_dir)
    }

    async fn fetch(&self, file_name: &str) -> Result<Option<SealedRecord>, VaultlineError> {
        let Some(blob) = self.remote.download_file(&self.path(file_name)).await? else {
            return Ok(None);
        };
        let plaintext = self.root_key.open_blob(&blob)?;
        serde_json::from_slice(&plaintext)
            .map(Some)
            .map_err(|e| VaultlineError::Sync {
                message: format!("malformed remote record {file_name}"),
                source: Some(Box::new(e)),
            })
    }

    async fn push(&self, name: &str, value: &str) -> Result<(), VaultlineError> {
        let record = SealedRecord {
            name: name.to_string(),
            value: value.to_string(),
        };
        let plaintext = serde_json::to_vec(&record).map_err(|e| VaultlineError::Sync {
            message: "cannot encode record".to_string(),
            source: Some(Box::new(e)),
        })?;
        let sealed = self.root_key.seal_blob(&plaintext)?;
        self.remote
            .upload_file(&self.path(&Self::file_name(name)), &sealed)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SyncEngine for MirrorSyncEngine {
    async fn initialize(&mut self) -> Result<(), VaultlineError> {
        if !self.remote.verify_repository().await? {
            return Err(VaultlineError::Sync {
                message: "remote repository is missing or not accessible".to_string(),
                source: None,
            });
        }
        self.initialized = true;
        Ok(())
    }

    async fn sync(&mut self) -> Result<SyncReport, VaultlineError> {
        if !self.initialized {
            return Err(VaultlineError::Internal(
                "sync component used before initialize".to_string(),
            ));
        }

        let mut remote_files: BTreeSet<String> = self
            .remote
            .list_files(&self.records_dir)
            .await?
            .into_iter()
            .filter(|name| name.ends_with(RECORD_SUFFIX))
            .collect();

        let mut local: BTreeMap<String, String> = BTreeMap::new();
        for name in self.local.keys().await? {
            if let Some(value) = self.local.get(&name).await? {
                local.insert(name, value);
            }
        }

        let mut report = SyncReport::default();
        for (name, value) in &local {
            let file_name = Self::file_name(name);
            if remote_files.remove(&file_name) {
                match self.fetch(&file_name).await? {
                    Some(remote) if remote.value == *value => {}
                    Some(_) => {
                        debug!(file = %file_name, "record differs on both sides");
                        report.conflicts += 1;
                    }
                    None => {
                        self.push(name, value).await?;
                        report.pushed += 1;
                    }
                }
            } else {
                self.push(name, value).await?;
                report.pushed += 1;
            }
        }

        for file_name in remote_files {
            if let Some(record) = self.fetch(&file_name).await? {
                self.local.put(&record.name, &record.value).await?;
                report.pulled += 1;
            }
        }

        info!(
            pushed = report.pushed,
            pulled = report.pulled,
            conflicts = report.conflicts,
            "mirror pass complete"
        );
        Ok(report)
    }

    async fn dispose(&mut self) -> Result<(), VaultlineError> {
        self.initialized = false;
        Ok(())
    }
}

/// Builds a [`MirrorSyncEngine`] against the GitHub contents API.
pub struct MirrorEngineFactory {
    api_base_url: String,
    records_dir: String,
    records: Arc<dyn KeyValueStore>,
}

impl MirrorEngineFactory {
    pub fn new(
        api_base_url: impl Into<String>,
        records_dir: impl Into<String>,
        records: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            records_dir: records_dir.into(),
            records,
        }
    }

    /// Takes the API base URL and records directory from the `[sync]`
    /// config section.
    pub fn from_config(config: &SyncConfig, records: Arc<dyn KeyValueStore>) -> Self {
        Self::new(&config.api_base_url, &config.records_dir, records)
    }
}

#[async_trait]
impl SyncEngineFactory for MirrorEngineFactory {
    async fn create(
        &self,
        credentials: SyncCredentials,
        root_key: SecretString,
    ) -> Result<Box<dyn SyncEngine>, VaultlineError> {
        let root_key = RootKey::from_hex(&root_key)?;
        let remote = GithubObjectStore::new(&self.api_base_url, &credentials)?;
        Ok(Box::new(MirrorSyncEngine::new(
            Arc::new(remote),
            Arc::clone(&self.records),
            root_key,
            self.records_dir.clone(),
        )))
    }
}
