// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end background runs against a real SQLite database, the encrypted
//! vault and a mocked GitHub contents API.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vaultline_config::model::{StorageConfig, SyncConfig};
use vaultline_core::{BatterySnapshot, ChargingState, ConnectionType, KeyValueStore, keys};
use vaultline_device::{BatteryMonitor, ConnectivityMonitor, StaticBatteryProbe, StaticNetworkProbe};
use vaultline_storage::Database;
use vaultline_sync::{
    ContextLoader, DurableJobScheduler, RunOutcome, SYNC_TASK_NAME, StorageContextLoader,
    SyncContext, SyncJobRunner, SyncScheduler, SyncServices,
};
use vaultline_vault::{CredentialVault, KdfParams, RootKey};

const PASSPHRASE: &str = "correct horse battery staple";
const FAST: KdfParams = KdfParams {
    memory_cost: 32768,
    iterations: 2,
    parallelism: 1,
};
const RECORD_PATH: &str = r"^/repos/alice/vault/contents/vault/[0-9a-f]{64}\.json$";

struct Fixture {
    _dir: TempDir,
    storage: StorageConfig,
    sync: SyncConfig,
    db: Database,
    services: SyncServices,
}

impl Fixture {
    async fn new(api_base_url: String) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            database_path: dir.path().join("vaultline.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let sync = SyncConfig {
            api_base_url,
            ..SyncConfig::default()
        };
        let db = Database::open(&storage.database_path).await.unwrap();
        let services = SyncServices {
            jobs: Arc::new(DurableJobScheduler::new(db.clone())),
            battery: BatteryMonitor::new(Arc::new(StaticBatteryProbe::new(
                BatterySnapshot::new(80, ChargingState::Discharging),
            ))),
            connectivity: Arc::new(ConnectivityMonitor::new(Arc::new(StaticNetworkProbe::new(
                vec![ConnectionType::Wifi],
            )))),
        };
        Self {
            _dir: dir,
            storage,
            sync,
            db,
            services,
        }
    }

    async fn create_vault(&self) -> CredentialVault {
        let vault = CredentialVault::create(
            &self.db,
            keys::CREDENTIAL_STORE,
            &SecretString::from(PASSPHRASE.to_string()),
            FAST,
        )
        .await
        .unwrap();
        let root_key = RootKey::generate().unwrap().to_hex();
        vault
            .put_many(&[
                (keys::GITHUB_TOKEN, "ghp_e2e".to_string()),
                (keys::GITHUB_OWNER, "alice".to_string()),
                (keys::GITHUB_REPO, "vault".to_string()),
                (keys::ROOT_KEY, root_key.expose_secret().to_string()),
            ])
            .await
            .unwrap();
        vault
    }

    fn loader(&self, passphrase: Option<&str>) -> Arc<StorageContextLoader> {
        Arc::new(StorageContextLoader::new(
            self.storage.clone(),
            self.sync.clone(),
            passphrase.map(|p| SecretString::from(p.to_string())),
        ))
    }

    async fn enable(&self) {
        let loader = self.loader(Some(PASSPHRASE));
        let ctx = SyncContext::load(loader.as_ref()).await.unwrap();
        SyncScheduler::new(ctx, self.services.clone())
            .set_enabled(true, 60, false, false)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn background_run_pushes_local_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/vault"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/vault/contents/vault"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(RECORD_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(RECORD_PATH))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"commit": {"sha": "c1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fixture = Fixture::new(server.uri()).await;
    let vault = fixture.create_vault().await;
    vault
        .store(keys::RECORD_STORE)
        .put("prod-db", "alice@db.internal:22")
        .await
        .unwrap();
    fixture.enable().await;

    let runner = SyncJobRunner::new(fixture.loader(Some(PASSPHRASE)), fixture.services.clone());
    let outcome = runner.run(SYNC_TASK_NAME).await;

    match outcome {
        RunOutcome::Succeeded(report) => assert_eq!(report.pushed, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let reopened = fixture.loader(None);
    let history = reopened
        .open_state()
        .await
        .unwrap()
        .load_history()
        .await
        .unwrap();
    assert_eq!(history.last_sync_success, Some(true));
    assert_eq!(history.consecutive_failures, 0);
}

#[tokio::test]
async fn background_run_without_passphrase_is_recorded() {
    let server = MockServer::start().await;
    let fixture = Fixture::new(server.uri()).await;
    fixture.create_vault().await;
    fixture.enable().await;

    let runner = SyncJobRunner::new(fixture.loader(None), fixture.services.clone());
    let outcome = runner.run(SYNC_TASK_NAME).await;

    assert_eq!(
        outcome,
        RunOutcome::Failed("vault error: vault passphrase not available".to_string())
    );
    let state = fixture.loader(None).open_state().await.unwrap();
    let history = state.load_history().await.unwrap();
    assert_eq!(history.consecutive_failures, 1);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn wrong_passphrase_is_recorded() {
    let server = MockServer::start().await;
    let fixture = Fixture::new(server.uri()).await;
    fixture.create_vault().await;
    fixture.enable().await;

    let runner = SyncJobRunner::new(fixture.loader(Some("not it")), fixture.services.clone());
    let outcome = runner.run(SYNC_TASK_NAME).await;

    assert!(matches!(outcome, RunOutcome::Failed(ref m) if m.contains("invalid passphrase")));
}

#[tokio::test]
async fn enabling_writes_the_durable_job_table() {
    let server = MockServer::start().await;
    let fixture = Fixture::new(server.uri()).await;
    fixture.create_vault().await;

    fixture.enable().await;

    let jobs = DurableJobScheduler::new(fixture.db.clone())
        .registrations()
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].task, SYNC_TASK_NAME);
    assert_eq!(jobs[0].interval_secs, Some(3600));
}
