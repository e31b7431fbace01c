// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync component and remote store doubles.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use vaultline_core::{
    RemoteObjectStore, SyncCredentials, SyncEngine, SyncEngineFactory, SyncReport,
    VaultlineError,
};

#[derive(Default)]
struct EngineCounters {
    created: AtomicUsize,
    synced: AtomicUsize,
    disposed: AtomicUsize,
}

/// Hands out sync components that replay scripted results.
///
/// Each `create` pops the next scripted result. With an empty script the
/// component succeeds with the default report.
pub struct ScriptedSyncEngineFactory {
    script: Mutex<VecDeque<Result<SyncReport, String>>>,
    default_report: SyncReport,
    fail_create: AtomicBool,
    last_owner: Mutex<Option<String>>,
    counters: Arc<EngineCounters>,
}

impl ScriptedSyncEngineFactory {
    pub fn new(default_report: SyncReport) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_report,
            fail_create: AtomicBool::new(false),
            last_owner: Mutex::new(None),
            counters: Arc::new(EngineCounters::default()),
        }
    }

    pub async fn push_result(&self, result: Result<SyncReport, &str>) {
        self.script
            .lock()
            .await
            .push_back(result.map_err(str::to_string));
    }

    /// Queues `count` failures with the same message.
    pub async fn push_failures(&self, count: usize, message: &str) {
        for _ in 0..count {
            self.push_result(Err(message)).await;
        }
    }

    /// Makes `create` itself fail, as a malformed root key would.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn synced(&self) -> usize {
        self.counters.synced.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.counters.disposed.load(Ordering::SeqCst)
    }

    /// Repository owner from the most recent `create`.
    pub async fn last_owner(&self) -> Option<String> {
        self.last_owner.lock().await.clone()
    }
}

impl Default for ScriptedSyncEngineFactory {
    fn default() -> Self {
        Self::new(SyncReport::default())
    }
}

#[async_trait]
impl SyncEngineFactory for ScriptedSyncEngineFactory {
    async fn create(
        &self,
        credentials: SyncCredentials,
        _root_key: SecretString,
    ) -> Result<Box<dyn SyncEngine>, VaultlineError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(VaultlineError::Vault("invalid root key".to_string()));
        }
        *self.last_owner.lock().await = Some(credentials.owner);
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(self.default_report));
        Ok(Box::new(ScriptedEngine {
            outcome: Some(outcome),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedEngine {
    outcome: Option<Result<SyncReport, String>>,
    counters: Arc<EngineCounters>,
}

#[async_trait]
impl SyncEngine for ScriptedEngine {
    async fn initialize(&mut self) -> Result<(), VaultlineError> {
        Ok(())
    }

    async fn sync(&mut self) -> Result<SyncReport, VaultlineError> {
        self.counters.synced.fetch_add(1, Ordering::SeqCst);
        match self.outcome.take() {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(VaultlineError::Sync {
                message,
                source: None,
            }),
            None => Err(VaultlineError::Internal("engine synced twice".to_string())),
        }
    }

    async fn dispose(&mut self) -> Result<(), VaultlineError> {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A remote object store backed by a map of path to bytes.
#[derive(Default)]
pub struct MemoryObjectStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    commits: AtomicUsize,
    missing_repository: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_missing_repository(&self, missing: bool) {
        self.missing_repository.store(missing, Ordering::SeqCst);
    }

    pub async fn paths(&self) -> Vec<String> {
        self.files.lock().await.keys().cloned().collect()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteObjectStore for MemoryObjectStore {
    async fn upload_file(&self, path: &str, bytes: &[u8]) -> Result<String, VaultlineError> {
        self.files
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("commit-{n}"))
    }

    async fn download_file(&self, path: &str) -> Result<Option<Vec<u8>>, VaultlineError> {
        Ok(self.files.lock().await.get(path).cloned())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, VaultlineError> {
        let prefix = format!("{}/", dir.trim_matches('/'));
        Ok(self
            .files
            .lock()
            .await
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn delete_file(&self, path: &str) -> Result<(), VaultlineError> {
        self.files.lock().await.remove(path);
        Ok(())
    }

    async fn verify_repository(&self) -> Result<bool, VaultlineError> {
        Ok(!self.missing_repository.load(Ordering::SeqCst))
    }
}
