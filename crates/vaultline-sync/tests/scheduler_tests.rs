// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Foreground scheduler tests: settings, registration, adaptive interval
//! and failure backoff.

use std::time::Duration;

use vaultline_core::{ConnectionType, JobConstraints, SyncReport, VaultlineError};
use vaultline_sync::{IMMEDIATE_TASK_NAME, SYNC_TASK_NAME};
use vaultline_test_utils::{SchedulerCall, SyncHarness};

#[tokio::test]
async fn defaults_before_anything_is_saved() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    let settings = scheduler.settings().await.unwrap();
    assert!(!settings.enabled);
    assert_eq!(settings.interval_minutes, 60);
    assert!(!settings.require_wifi && !settings.require_charging);

    let history = scheduler.history().await.unwrap();
    assert_eq!(history.last_sync, None);
    assert_eq!(history.consecutive_failures, 0);
}

#[tokio::test]
async fn interval_is_clamped_to_the_supported_range() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    let low = scheduler.set_enabled(true, 5, false, false).await.unwrap();
    assert_eq!(low.interval_minutes, 15);

    let high = scheduler.set_enabled(true, 1000, false, false).await.unwrap();
    assert_eq!(high.interval_minutes, 360);

    let stored = harness.state().load_settings().await.unwrap();
    assert_eq!(stored.interval_minutes, 360);
}

#[tokio::test]
async fn enabling_persists_and_registers_the_periodic_job() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    scheduler.set_enabled(true, 30, true, false).await.unwrap();

    let stored = harness.state().load_settings().await.unwrap();
    assert!(stored.enabled);
    assert_eq!(stored.interval_minutes, 30);
    assert!(stored.require_wifi);
    assert!(!stored.require_charging);

    let (every, constraints) = harness.jobs.periodic(SYNC_TASK_NAME).await.unwrap();
    assert_eq!(every, Duration::from_secs(30 * 60));
    assert_eq!(
        constraints,
        JobConstraints {
            require_unmetered: true,
            require_charging: false,
        }
    );
}

#[tokio::test]
async fn re_enabling_replaces_the_registration() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    scheduler.set_enabled(true, 30, false, false).await.unwrap();
    scheduler.set_enabled(true, 90, false, true).await.unwrap();

    assert_eq!(harness.jobs.periodic_count().await, 1);
    assert_eq!(harness.jobs.periodic_registrations().await, 2);
    let (every, constraints) = harness.jobs.periodic(SYNC_TASK_NAME).await.unwrap();
    assert_eq!(every, Duration::from_secs(90 * 60));
    assert!(constraints.require_charging);
}

#[tokio::test]
async fn disabling_cancels_the_periodic_job() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    scheduler.set_enabled(true, 60, false, false).await.unwrap();
    scheduler.set_enabled(false, 60, false, false).await.unwrap();

    assert!(harness.jobs.periodic(SYNC_TASK_NAME).await.is_none());
    assert_eq!(
        harness.jobs.calls().await.last(),
        Some(&SchedulerCall::Cancel(SYNC_TASK_NAME.to_string()))
    );
    assert!(!harness.state().load_settings().await.unwrap().enabled);
}

#[tokio::test]
async fn immediate_sync_is_a_one_off_job() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    scheduler.trigger_immediate_sync().await.unwrap();

    assert!(harness.jobs.one_off_pending(IMMEDIATE_TASK_NAME).await);
    assert!(harness.jobs.periodic(SYNC_TASK_NAME).await.is_none());
}

#[tokio::test]
async fn adapt_interval_follows_the_battery_policy() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;
    scheduler.set_enabled(true, 60, false, false).await.unwrap();

    harness.set_battery(35, false);
    assert_eq!(scheduler.adapt_interval().await.unwrap(), Some(120));
    assert_eq!(
        harness.jobs.periodic(SYNC_TASK_NAME).await.unwrap().0,
        Duration::from_secs(120 * 60)
    );

    assert_eq!(scheduler.adapt_interval().await.unwrap(), None);

    harness.set_battery(35, true);
    assert_eq!(scheduler.adapt_interval().await.unwrap(), Some(15));
    assert_eq!(harness.state().load_settings().await.unwrap().interval_minutes, 15);
}

#[tokio::test]
async fn adapt_interval_does_nothing_while_disabled() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;
    harness.set_battery(15, false);

    assert_eq!(scheduler.adapt_interval().await.unwrap(), None);
    assert_eq!(harness.jobs.periodic_registrations().await, 0);
}

#[tokio::test]
async fn run_now_records_success() {
    let harness = SyncHarness::new().with_credentials().await;
    let scheduler = harness.scheduler().await;

    let report = scheduler.run_now().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            pushed: 2,
            pulled: 0,
            conflicts: 0,
        }
    );
    let history = harness.state().load_history().await.unwrap();
    assert_eq!(history.last_sync_success, Some(true));
    assert!(history.last_sync.is_some());
    assert_eq!(history.last_sync_error, None);
    assert_eq!(harness.engines.last_owner().await.as_deref(), Some("alice"));
    assert_eq!(harness.engines.disposed(), 1);
}

#[tokio::test]
async fn run_now_offline_records_nothing() {
    let harness = SyncHarness::new().with_credentials().await;
    harness.set_network(vec![]);
    let scheduler = harness.scheduler().await;

    let err = scheduler.run_now().await.unwrap_err();

    assert!(matches!(err, VaultlineError::Offline));
    assert_eq!(harness.engines.created(), 0);
    let history = harness.state().load_history().await.unwrap();
    assert_eq!(history.last_sync, None);
}

#[tokio::test]
async fn run_now_ignores_the_battery_gate() {
    let harness = SyncHarness::new().with_credentials().await;
    harness.set_battery(5, false);
    let scheduler = harness.scheduler().await;

    scheduler.run_now().await.unwrap();

    assert_eq!(harness.engines.synced(), 1);
}

#[tokio::test]
async fn run_now_without_credentials_is_recorded() {
    let harness = SyncHarness::new();
    let scheduler = harness.scheduler().await;

    let err = scheduler.run_now().await.unwrap_err();

    assert!(matches!(err, VaultlineError::CredentialsMissing(_)));
    let history = harness.state().load_history().await.unwrap();
    assert_eq!(history.last_sync_success, Some(false));
    assert_eq!(
        history.last_sync_error.as_deref(),
        Some("credentials not configured")
    );
    assert_eq!(history.consecutive_failures, 1);
}

#[tokio::test]
async fn component_is_disposed_when_sync_fails() {
    let harness = SyncHarness::new().with_credentials().await;
    harness.engines.push_result(Err("remote rejected push")).await;
    let scheduler = harness.scheduler().await;

    let err = scheduler.run_now().await.unwrap_err();

    assert_eq!(err.to_string(), "sync failed: remote rejected push");
    assert_eq!(harness.engines.disposed(), 1);
}

#[tokio::test]
async fn backoff_starts_after_the_third_consecutive_failure() {
    let harness = SyncHarness::new().with_credentials().await;
    let scheduler = harness.scheduler().await;
    scheduler.set_enabled(true, 60, false, false).await.unwrap();
    harness.set_battery(35, false);
    harness.engines.push_failures(4, "server unavailable").await;

    for expected in 1..=3 {
        scheduler.run_now().await.unwrap_err();
        let history = harness.state().load_history().await.unwrap();
        assert_eq!(history.consecutive_failures, expected);
        assert_eq!(harness.state().load_settings().await.unwrap().interval_minutes, 60);
    }

    scheduler.run_now().await.unwrap_err();
    assert_eq!(harness.state().load_history().await.unwrap().consecutive_failures, 4);
    assert_eq!(harness.state().load_settings().await.unwrap().interval_minutes, 120);
}

#[tokio::test]
async fn success_after_a_backoff_streak_re_evaluates_the_interval() {
    let harness = SyncHarness::new().with_credentials().await;
    let scheduler = harness.scheduler().await;
    scheduler.set_enabled(true, 60, false, false).await.unwrap();
    harness.set_battery(35, false);
    harness.engines.push_failures(4, "server unavailable").await;
    for _ in 0..4 {
        scheduler.run_now().await.unwrap_err();
    }
    assert_eq!(harness.state().load_settings().await.unwrap().interval_minutes, 120);

    harness.set_battery(90, false);
    scheduler.run_now().await.unwrap();

    let history = harness.state().load_history().await.unwrap();
    assert_eq!(history.consecutive_failures, 0);
    assert_eq!(history.last_sync_error, None);
    assert_eq!(harness.state().load_settings().await.unwrap().interval_minutes, 60);
}

#[tokio::test]
async fn status_combines_settings_history_and_device_state() {
    let harness = SyncHarness::new();
    harness.set_network(vec![ConnectionType::Cellular]);
    harness.set_battery(45, false);
    let scheduler = harness.scheduler().await;
    scheduler.set_enabled(true, 45, true, false).await.unwrap();

    let status = scheduler.status().await.unwrap();

    assert!(status.settings.enabled);
    assert_eq!(status.settings.interval_minutes, 45);
    assert!(status.connectivity.connected);
    assert!(status.connectivity.metered);
    assert_eq!(status.battery.level, 45);
    assert!(status.battery.should_optimize);
    assert_eq!(status.battery.recommended_interval_minutes, 120);
}
