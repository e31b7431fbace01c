// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording doubles for platform services.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use vaultline_core::{JobConstraints, JobScheduler, PresenceNotifier, VaultlineError, WakeLock};

/// Tracks which notifications are currently shown.
#[derive(Default)]
pub struct RecordingNotifier {
    active: Mutex<BTreeMap<u32, (String, String)>>,
    shown_total: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active_ids(&self) -> BTreeSet<u32> {
        self.active.lock().await.keys().copied().collect()
    }

    /// Body text of an active notification.
    pub async fn body(&self, id: u32) -> Option<String> {
        self.active.lock().await.get(&id).map(|(_, body)| body.clone())
    }

    pub fn shown_total(&self) -> usize {
        self.shown_total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceNotifier for RecordingNotifier {
    async fn show(&self, id: u32, title: &str, body: &str) -> Result<(), VaultlineError> {
        self.shown_total.fetch_add(1, Ordering::SeqCst);
        self.active
            .lock()
            .await
            .insert(id, (title.to_string(), body.to_string()));
        Ok(())
    }

    async fn cancel(&self, id: u32) -> Result<(), VaultlineError> {
        self.active.lock().await.remove(&id);
        Ok(())
    }
}

/// A wake-lock that remembers whether it is held.
#[derive(Default)]
pub struct RecordingWakeLock {
    held: AtomicBool,
    acquisitions: AtomicUsize,
}

impl RecordingWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WakeLock for RecordingWakeLock {
    async fn acquire(&self) -> Result<(), VaultlineError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<(), VaultlineError> {
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// One call received by [`MockJobScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Periodic {
        task: String,
        every: Duration,
        constraints: JobConstraints,
    },
    OneOff(String),
    Cancel(String),
}

/// In-memory job scheduler with replace-on-register semantics.
#[derive(Default)]
pub struct MockJobScheduler {
    calls: Mutex<Vec<SchedulerCall>>,
    periodic: Mutex<BTreeMap<String, (Duration, JobConstraints)>>,
    one_off: Mutex<BTreeSet<String>>,
}

impl MockJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().await.clone()
    }

    /// Number of `register_periodic` calls so far.
    pub async fn periodic_registrations(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, SchedulerCall::Periodic { .. }))
            .count()
    }

    /// The current registration for `task`, if any.
    pub async fn periodic(&self, task: &str) -> Option<(Duration, JobConstraints)> {
        self.periodic.lock().await.get(task).copied()
    }

    pub async fn periodic_count(&self) -> usize {
        self.periodic.lock().await.len()
    }

    pub async fn one_off_pending(&self, task: &str) -> bool {
        self.one_off.lock().await.contains(task)
    }
}

#[async_trait]
impl JobScheduler for MockJobScheduler {
    async fn register_periodic(
        &self,
        task: &str,
        every: Duration,
        constraints: JobConstraints,
    ) -> Result<(), VaultlineError> {
        self.calls.lock().await.push(SchedulerCall::Periodic {
            task: task.to_string(),
            every,
            constraints,
        });
        self.periodic
            .lock()
            .await
            .insert(task.to_string(), (every, constraints));
        Ok(())
    }

    async fn register_one_off(&self, task: &str) -> Result<(), VaultlineError> {
        self.calls
            .lock()
            .await
            .push(SchedulerCall::OneOff(task.to_string()));
        self.one_off.lock().await.insert(task.to_string());
        Ok(())
    }

    async fn cancel(&self, task: &str) -> Result<(), VaultlineError> {
        self.calls
            .lock()
            .await
            .push(SchedulerCall::Cancel(task.to_string()));
        self.periodic.lock().await.remove(task);
        self.one_off.lock().await.remove(task);
        Ok(())
    }
}
