// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mirror sync component against an in-memory remote.

use std::sync::Arc;

use vaultline_core::{KeyValueStore, RemoteObjectStore, SyncEngine, SyncReport, VaultlineError};
use vaultline_storage::MemoryKeyValueStore;
use vaultline_sync::MirrorSyncEngine;
use vaultline_test_utils::MemoryObjectStore;
use vaultline_vault::RootKey;

struct Device {
    local: Arc<MemoryKeyValueStore>,
    engine: MirrorSyncEngine,
}

fn device(remote: &Arc<MemoryObjectStore>, key_hex: &secrecy::SecretString) -> Device {
    let local = Arc::new(MemoryKeyValueStore::new());
    let engine = MirrorSyncEngine::new(
        Arc::clone(remote) as Arc<dyn RemoteObjectStore>,
        Arc::clone(&local) as Arc<dyn KeyValueStore>,
        RootKey::from_hex(key_hex).unwrap(),
        "vault",
    );
    Device { local, engine }
}

async fn pass(engine: &mut MirrorSyncEngine) -> SyncReport {
    engine.initialize().await.unwrap();
    let report = engine.sync().await.unwrap();
    engine.dispose().await.unwrap();
    report
}

#[tokio::test]
async fn records_travel_between_devices() {
    let remote = Arc::new(MemoryObjectStore::new());
    let key = RootKey::generate().unwrap().to_hex();
    let mut laptop = device(&remote, &key);
    let mut phone = device(&remote, &key);

    laptop.local.put("prod-db", "alice@db.internal:22").await.unwrap();
    laptop.local.put("staging", "deploy@stage:2222").await.unwrap();

    let pushed = pass(&mut laptop.engine).await;
    assert_eq!(
        pushed,
        SyncReport {
            pushed: 2,
            pulled: 0,
            conflicts: 0,
        }
    );

    let pulled = pass(&mut phone.engine).await;
    assert_eq!(pulled.pulled, 2);
    assert_eq!(
        phone.local.get("prod-db").await.unwrap().as_deref(),
        Some("alice@db.internal:22")
    );

    let again = pass(&mut laptop.engine).await;
    assert_eq!(again, SyncReport::default());
}

#[tokio::test]
async fn remote_paths_hide_record_names_and_contents() {
    let remote = Arc::new(MemoryObjectStore::new());
    let key = RootKey::generate().unwrap().to_hex();
    let mut laptop = device(&remote, &key);
    laptop.local.put("prod-db", "hunter2").await.unwrap();

    pass(&mut laptop.engine).await;

    let paths = remote.paths().await;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with("vault/"));
    assert!(paths[0].ends_with(".json"));
    assert!(!paths[0].contains("prod-db"));

    let blob = remote.download_file(&paths[0]).await.unwrap().unwrap();
    assert!(!String::from_utf8_lossy(&blob).contains("hunter2"));
}

#[tokio::test]
async fn diverging_values_are_counted_as_conflicts() {
    let remote = Arc::new(MemoryObjectStore::new());
    let key = RootKey::generate().unwrap().to_hex();
    let mut laptop = device(&remote, &key);
    let mut phone = device(&remote, &key);

    laptop.local.put("prod-db", "old-host").await.unwrap();
    pass(&mut laptop.engine).await;
    phone.local.put("prod-db", "new-host").await.unwrap();

    let report = pass(&mut phone.engine).await;

    assert_eq!(report.conflicts, 1);
    assert_eq!(report.pushed, 0);
    assert_eq!(
        phone.local.get("prod-db").await.unwrap().as_deref(),
        Some("new-host")
    );
    assert_eq!(remote.commit_count(), 1);
}

#[tokio::test]
async fn foreign_root_key_cannot_read_the_mirror() {
    let remote = Arc::new(MemoryObjectStore::new());
    let mut laptop = device(&remote, &RootKey::generate().unwrap().to_hex());
    let mut intruder = device(&remote, &RootKey::generate().unwrap().to_hex());
    laptop.local.put("prod-db", "secret").await.unwrap();
    pass(&mut laptop.engine).await;

    intruder.engine.initialize().await.unwrap();
    assert!(intruder.engine.sync().await.is_err());
    assert_eq!(intruder.local.get("prod-db").await.unwrap(), None);
}

#[tokio::test]
async fn missing_repository_fails_initialize() {
    let remote = Arc::new(MemoryObjectStore::new());
    remote.set_missing_repository(true);
    let mut laptop = device(&remote, &RootKey::generate().unwrap().to_hex());

    let err = laptop.engine.initialize().await.unwrap_err();

    assert!(matches!(err, VaultlineError::Sync { .. }));
}

#[tokio::test]
async fn sync_before_initialize_is_rejected() {
    let remote = Arc::new(MemoryObjectStore::new());
    let mut laptop = device(&remote, &RootKey::generate().unwrap().to_hex());

    let err = laptop.engine.sync().await.unwrap_err();

    assert!(matches!(err, VaultlineError::Internal(_)));
    assert_eq!(remote.commit_count(), 0);
}
