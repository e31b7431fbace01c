// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform services: job scheduling, persistent notifications and wake-locks.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::VaultlineError;
use crate::types::JobConstraints;

/// What a job callback reports back to the platform scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCompletion {
    /// The run is finished, whatever its outcome. Do not retry.
    Handled,
    /// Ask the platform to retry with its own backoff.
    Retry,
}

/// A platform facility that runs tasks in an isolated execution context.
///
/// Tasks are addressed by name only. Registering a name that is already
/// registered replaces the earlier registration.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn register_periodic(
        &self,
        task: &str,
        every: Duration,
        constraints: JobConstraints,
    ) -> Result<(), VaultlineError>;

    /// Requests a single run as soon as constraints allow.
    async fn register_one_off(&self, task: &str) -> Result<(), VaultlineError>;

    /// Cancels a registration. Cancelling an unknown task is not an error.
    async fn cancel(&self, task: &str) -> Result<(), VaultlineError>;
}

/// A long-lived, non-dismissable status notification.
#[async_trait]
pub trait PresenceNotifier: Send + Sync {
    async fn show(&self, id: u32, title: &str, body: &str) -> Result<(), VaultlineError>;

    async fn cancel(&self, id: u32) -> Result<(), VaultlineError>;
}

/// Keeps the process from being suspended while held.
#[async_trait]
pub trait WakeLock: Send + Sync {
    async fn acquire(&self) -> Result<(), VaultlineError>;

    async fn release(&self) -> Result<(), VaultlineError>;
}
