// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry tests: lifetime, notifications and the wake-lock.

use std::collections::BTreeSet;
use std::time::Duration;

use vaultline_core::{SessionId, SessionState, VaultlineError};
use vaultline_session::ConnectionSession;
use vaultline_test_utils::{SessionHarness, key_credential, password_credential};

async fn wait_for_state(session: &ConnectionSession, wanted: SessionState) {
    let mut rx = session.state_changes();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == wanted))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

#[tokio::test]
async fn persistent_session_holds_wake_lock_and_shows_presence() {
    let harness = SessionHarness::new();

    let session = harness
        .registry
        .connect_session(password_credential("db.internal"), true)
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.notification_id(), Some(1000));
    assert!(harness.wake_lock.is_held());
    assert!(harness.registry.wake_lock_held().await);
    assert_eq!(
        harness.notifier.body(1000).await.as_deref(),
        Some("Connected to alice@db.internal:22")
    );

    harness.registry.close_session(session.id()).await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!harness.wake_lock.is_held());
    assert!(harness.notifier.active_ids().await.is_empty());
    assert_eq!(harness.registry.session_count(), 0);
}

#[tokio::test]
async fn non_persistent_session_leaves_wake_lock_alone() {
    let harness = SessionHarness::new();

    let session = harness
        .registry
        .connect_session(password_credential("db.internal"), false)
        .await
        .unwrap();

    assert_eq!(session.notification_id(), None);
    assert!(!harness.wake_lock.is_held());
    assert_eq!(harness.wake_lock.acquisitions(), 0);
    assert_eq!(harness.notifier.shown_total(), 0);
}

#[tokio::test]
async fn wake_lock_is_released_with_the_last_persistent_session() {
    let harness = SessionHarness::new();
    let registry = &harness.registry;

    let first = registry
        .connect_session(password_credential("a.example"), true)
        .await
        .unwrap();
    let second = registry
        .connect_session(key_credential("b.example", 2222), true)
        .await
        .unwrap();
    let transient = registry
        .connect_session(password_credential("c.example"), false)
        .await
        .unwrap();

    assert_eq!(harness.wake_lock.acquisitions(), 1);
    assert_eq!(
        harness.notifier.active_ids().await,
        BTreeSet::from([1000, 1001])
    );

    registry.close_session(first.id()).await.unwrap();
    assert!(harness.wake_lock.is_held());

    registry.close_session(second.id()).await.unwrap();
    assert!(!harness.wake_lock.is_held());
    assert_eq!(registry.session_count(), 1);
    assert_eq!(transient.state(), SessionState::Connected);
}

#[tokio::test]
async fn failed_connect_session_is_removed() {
    let harness = SessionHarness::new();
    harness.connector.reject_auth(true);

    let err = harness
        .registry
        .connect_session(password_credential("db.internal"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, VaultlineError::AuthRejected { .. }));
    assert_eq!(harness.registry.session_count(), 0);
    assert!(!harness.wake_lock.is_held());
    assert!(harness.notifier.active_ids().await.is_empty());
}

#[tokio::test]
async fn create_session_returns_before_the_connection_is_up() {
    let harness = SessionHarness::new();
    harness.connector.hold();

    let session = harness
        .registry
        .create_session(password_credential("db.internal"), false)
        .await;

    assert!(session.state().is_active() || session.state() == SessionState::Disconnected);
    assert!(harness.registry.get_session(session.id()).is_some());

    harness.connector.release();
    wait_for_state(&session, SessionState::Connected).await;
}

#[tokio::test]
async fn failed_background_connect_stays_registered_for_retry() {
    let harness = SessionHarness::new();
    harness
        .connector
        .fail_connect_with(Some("network unreachable"))
        .await;

    let session = harness
        .registry
        .create_session(password_credential("db.internal"), false)
        .await;
    wait_for_state(&session, SessionState::Error).await;

    assert_eq!(harness.registry.session_count(), 1);
    assert_eq!(
        session.last_error().as_deref(),
        Some("connection error: network unreachable")
    );

    harness.connector.fail_connect_with(None).await;
    session.reconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn close_all_sessions_empties_the_table() {
    let harness = SessionHarness::new();
    for host in ["a.example", "b.example", "c.example"] {
        harness
            .registry
            .connect_session(password_credential(host), true)
            .await
            .unwrap();
    }

    let closed = harness.registry.close_all_sessions().await;

    assert_eq!(closed, 3);
    assert_eq!(harness.registry.session_count(), 0);
    assert!(!harness.wake_lock.is_held());
    assert_eq!(harness.connector.transport_close_count(), 3);
    assert!(harness.notifier.active_ids().await.is_empty());
}

#[tokio::test]
async fn closing_an_unknown_session_is_reported() {
    let harness = SessionHarness::new();

    let err = harness
        .registry
        .close_session(&SessionId("nobody@nowhere:22#0".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, VaultlineError::SessionNotFound(_)));
}

#[tokio::test]
async fn same_credential_twice_yields_distinct_sessions() {
    let harness = SessionHarness::new();
    let registry = &harness.registry;

    let first = registry
        .connect_session(password_credential("db.internal"), false)
        .await
        .unwrap();
    let second = registry
        .connect_session(password_credential("db.internal"), false)
        .await
        .unwrap();

    assert_ne!(first.id(), second.id());
    assert!(first.id().to_string().starts_with("alice@db.internal:22#"));
    assert_eq!(registry.session_count(), 2);
    assert_eq!(harness.connector.connect_count(), 2);

    let found = registry
        .find_by_credential(&password_credential("db.internal"))
        .unwrap();
    assert!(found.id() == first.id() || found.id() == second.id());
    assert!(
        registry
            .find_by_credential(&key_credential("db.internal", 22))
            .is_none()
    );
}

#[tokio::test]
async fn get_all_sessions_lists_oldest_first() {
    let harness = SessionHarness::new();
    let registry = &harness.registry;

    let first = registry
        .connect_session(password_credential("a.example"), false)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = registry
        .connect_session(password_credential("b.example"), false)
        .await
        .unwrap();

    let all = registry.get_all_sessions();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id(), first.id());
    assert_eq!(all[1].id(), second.id());
}
