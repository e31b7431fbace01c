// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background synchronization for Vaultline.
//!
//! - [`SyncScheduler`] owns the persisted settings and the adaptive interval
//!   and registers the periodic job with a platform [`JobScheduler`](vaultline_core::JobScheduler).
//! - [`SyncJobRunner`] is what the platform invokes: it re-opens storage,
//!   applies the connectivity and battery gates, runs one sync attempt and
//!   records the outcome.
//! - [`DurableJobScheduler`] and [`JobDaemon`] provide the platform scheduler
//!   on hosts without one.
//! - [`GithubObjectStore`] and [`MirrorSyncEngine`] are the default remote
//!   store and sync component.

pub mod context;
pub mod mirror;
pub mod platform;
pub mod remote;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use context::{
    ContextLoader, StorageContextLoader, SyncContext, SyncServices, VaultHandles,
};
pub use mirror::{MirrorEngineFactory, MirrorSyncEngine};
pub use platform::{DurableJobScheduler, JobDaemon, JobLauncher};
pub use remote::GithubObjectStore;
pub use runner::{RunOutcome, SkipReason, SyncJobRunner};
pub use scheduler::{
    BACKOFF_FAILURE_THRESHOLD, IMMEDIATE_TASK_NAME, SYNC_TASK_NAME, SyncScheduler, SyncStatus,
};
pub use state::SyncStateStore;
