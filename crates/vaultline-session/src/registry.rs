// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide table of connection sessions.
//!
//! The registry is constructed once by the composition root and shared as
//! `Arc<SessionRegistry>`. It is the only component that touches the
//! presence notification and the wake-lock: each persistent session gets
//! its own notification, and the wake-lock is held exactly while at least
//! one persistent session is in the table.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use vaultline_core::{
    ConnectionCredential, PresenceNotifier, SessionId, VaultlineError, WakeLock,
};

use crate::session::{ConnectionSession, SessionDeps};

/// Notification ids handed to persistent sessions start here.
pub const FIRST_NOTIFICATION_ID: u32 = 1000;

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<ConnectionSession>>,
    deps: SessionDeps,
    notifier: Arc<dyn PresenceNotifier>,
    wake_lock: Arc<dyn WakeLock>,
    app_name: String,
    next_notification_id: AtomicU32,
    /// Whether the wake-lock is currently held. The mutex also serializes
    /// acquire/release against each other.
    wake_lock_held: tokio::sync::Mutex<bool>,
}

impl SessionRegistry {
    pub fn new(
        deps: SessionDeps,
        notifier: Arc<dyn PresenceNotifier>,
        wake_lock: Arc<dyn WakeLock>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            deps,
            notifier,
            wake_lock,
            app_name: app_name.into(),
            next_notification_id: AtomicU32::new(FIRST_NOTIFICATION_ID),
            wake_lock_held: tokio::sync::Mutex::new(false),
        }
    }

    /// Registers a new session and starts connecting it in the background.
    ///
    /// Returns immediately; watch [`ConnectionSession::state_changes`] to
    /// follow the attempt. A failed attempt leaves the session registered
    /// in `Error` so it can be retried with `reconnect`.
    ///
    /// A second call for a credential that already has a session creates a
    /// second, independent session. Use [`Self::find_by_credential`] to
    /// reuse instead.
    pub async fn create_session(
        &self,
        credential: ConnectionCredential,
        persistent: bool,
    ) -> Arc<ConnectionSession> {
        let session = self.register(credential, persistent).await;
        let background = Arc::clone(&session);
        tokio::spawn(async move {
            if let Err(e) = background.connect().await {
                debug!(session_id = %background.id(), error = %e, "background connect failed");
            }
        });
        session
    }

    /// Registers a new session and waits for it to connect. On failure the
    /// session is closed and removed before the error is returned.
    pub async fn connect_session(
        &self,
        credential: ConnectionCredential,
        persistent: bool,
    ) -> Result<Arc<ConnectionSession>, VaultlineError> {
        let session = self.register(credential, persistent).await;
        match session.connect().await {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = self.close_session(session.id()).await {
                    warn!(session_id = %session.id(), error = %close_err, "cleanup after failed connect");
                }
                Err(e)
            }
        }
    }

    /// Disconnects the session, removes it, cancels its notification, and
    /// releases the wake-lock if no persistent session remains.
    pub async fn close_session(&self, id: &SessionId) -> Result<(), VaultlineError> {
        let session = self
            .get_session(id)
            .ok_or_else(|| VaultlineError::SessionNotFound(id.to_string()))?;

        session.close().await;
        self.sessions.remove(id);

        if let Some(notification_id) = session.notification_id() {
            if let Err(e) = self.notifier.cancel(notification_id).await {
                warn!(session_id = %id, error = %e, "failed to cancel session notification");
            }
        }
        self.sync_wake_lock().await;

        info!(session_id = %id, remaining = self.sessions.len(), "session closed");
        Ok(())
    }

    /// Closes every session, continuing past individual failures. Returns
    /// how many sessions were closed.
    pub async fn close_all_sessions(&self) -> usize {
        let ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        let mut closed = 0;
        for id in ids {
            match self.close_session(&id).await {
                Ok(()) => closed += 1,
                Err(e) => warn!(session_id = %id, error = %e, "failed to close session"),
            }
        }
        closed
    }

    pub fn get_session(&self, id: &SessionId) -> Option<Arc<ConnectionSession>> {
        self.sessions.get(id).map(|e| Arc::clone(e.value()))
    }

    /// All sessions, oldest first.
    pub fn get_all_sessions(&self) -> Vec<Arc<ConnectionSession>> {
        let mut sessions: Vec<_> = self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        sessions.sort_by_key(|s| s.created_at());
        sessions
    }

    /// The oldest session for the same user, host and port, if any.
    pub fn find_by_credential(
        &self,
        credential: &ConnectionCredential,
    ) -> Option<Arc<ConnectionSession>> {
        self.get_all_sessions()
            .into_iter()
            .find(|s| s.credential().same_target(credential))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry currently holds the wake-lock.
    pub async fn wake_lock_held(&self) -> bool {
        *self.wake_lock_held.lock().await
    }

    /// Gives every session a chance to restart a keep-alive that the battery
    /// policy had stopped.
    pub async fn refresh_keep_alive_all(&self) {
        for session in self.get_all_sessions() {
            session.refresh_keep_alive().await;
        }
    }

    async fn register(
        &self,
        credential: ConnectionCredential,
        persistent: bool,
    ) -> Arc<ConnectionSession> {
        let credential = Arc::new(credential);
        let notification_id =
            persistent.then(|| self.next_notification_id.fetch_add(1, Ordering::Relaxed));
        let base = format!(
            "{}#{}",
            credential.identity(),
            chrono::Utc::now().timestamp_millis()
        );

        let mut suffix = 0u32;
        let session = loop {
            let id = if suffix == 0 {
                SessionId(base.clone())
            } else {
                SessionId(format!("{base}-{suffix}"))
            };
            match self.sessions.entry(id.clone()) {
                Entry::Occupied(_) => suffix += 1,
                Entry::Vacant(slot) => {
                    let session = ConnectionSession::new(
                        id,
                        Arc::clone(&credential),
                        persistent,
                        notification_id,
                        self.deps.clone(),
                    );
                    slot.insert(Arc::clone(&session));
                    break session;
                }
            }
        };

        info!(
            session_id = %session.id(),
            target = %credential.identity(),
            persistent,
            "session registered"
        );

        if let Some(notification_id) = notification_id {
            let body = format!("Connected to {}", credential.identity());
            if let Err(e) = self
                .notifier
                .show(notification_id, &self.app_name, &body)
                .await
            {
                warn!(session_id = %session.id(), error = %e, "failed to show session notification");
            }
            self.sync_wake_lock().await;
        }

        session
    }

    /// Brings the wake-lock in line with the table contents.
    async fn sync_wake_lock(&self) {
        let mut held = self.wake_lock_held.lock().await;
        let wanted = self.sessions.iter().any(|e| e.value().is_persistent());

        if wanted && !*held {
            match self.wake_lock.acquire().await {
                Ok(()) => {
                    *held = true;
                    debug!("wake-lock acquired");
                }
                Err(e) => warn!(error = %e, "failed to acquire wake-lock"),
            }
        } else if !wanted && *held {
            match self.wake_lock.release().await {
                Ok(()) => {
                    *held = false;
                    debug!("wake-lock released");
                }
                Err(e) => warn!(error = %e, "failed to release wake-lock"),
            }
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
