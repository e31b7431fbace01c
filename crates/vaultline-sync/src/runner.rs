// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point for sync jobs launched by the platform scheduler.
//!
//! Each run starts from nothing: stores are re-opened through the
//! [`ContextLoader`], device state is sampled fresh, and the outcome is
//! written back through the run's own store handle. Policy refusals are
//! benign skips that leave history untouched; every other failure is
//! recorded. Whatever happens, the platform is told the job was handled so
//! its own retry policy does not stack on top of the adaptive backoff.

use std::sync::Arc;

use chrono::Utc;
use strum::Display;
use tracing::{error, info, warn};

use vaultline_core::{JobCompletion, SyncReport, VaultlineError};

use crate::context::{ContextLoader, SyncContext, SyncServices};
use crate::scheduler::{IMMEDIATE_TASK_NAME, SYNC_TASK_NAME, SyncScheduler};
use crate::state::SyncStateStore;

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    Offline,
    BatteryTooLow,
    MeteredNetwork,
    NotCharging,
    Disabled,
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Succeeded(SyncReport),
    Failed(String),
}

pub struct SyncJobRunner {
    loader: Arc<dyn ContextLoader>,
    services: SyncServices,
}

impl SyncJobRunner {
    pub fn new(loader: Arc<dyn ContextLoader>, services: SyncServices) -> Self {
        Self { loader, services }
    }

    /// Platform callback. Always reports [`JobCompletion::Handled`].
    pub async fn dispatch(&self, task: &str) -> JobCompletion {
        match task {
            SYNC_TASK_NAME | IMMEDIATE_TASK_NAME => {
                let outcome = self.run(task).await;
                match &outcome {
                    RunOutcome::Skipped(reason) => info!(task, %reason, "sync job skipped"),
                    RunOutcome::Succeeded(report) => info!(
                        task,
                        pushed = report.pushed,
                        pulled = report.pulled,
                        conflicts = report.conflicts,
                        "sync job finished"
                    ),
                    RunOutcome::Failed(message) => warn!(task, error = %message, "sync job failed"),
                }
            }
            other => warn!(task = other, "ignoring unknown job"),
        }
        JobCompletion::Handled
    }

    /// Runs one sync job for `task`.
    ///
    /// The periodic task additionally honours the persisted enable flag and
    /// network/charging constraints; the immediate task was requested
    /// explicitly and skips those checks.
    pub async fn run(&self, task: &str) -> RunOutcome {
        let state = match self.loader.open_state().await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "cannot open sync state, nothing recorded");
                return RunOutcome::Failed(e.to_string());
            }
        };

        if let Some(reason) = self.gate(&state, task == SYNC_TASK_NAME).await {
            return RunOutcome::Skipped(reason);
        }

        let vault = match self.loader.open_vault().await {
            Ok(vault) => vault,
            Err(e) => {
                if let Err(record_err) = state.record_failure(Utc::now(), &e.to_string()).await {
                    error!(error = %record_err, "failed to record sync failure");
                }
                return RunOutcome::Failed(e.to_string());
            }
        };

        let scheduler = SyncScheduler::new(SyncContext { state, vault }, self.services.clone());
        let result = scheduler.attempt().await;
        if let Err(e) = scheduler.record_outcome(&result).await {
            error!(error = %e, "failed to record sync outcome");
        }
        RunOutcome::from(&result)
    }

    async fn gate(&self, state: &SyncStateStore, periodic: bool) -> Option<SkipReason> {
        let network = self.services.connectivity.current_status();
        if !network.connected {
            return Some(SkipReason::Offline);
        }

        let snapshot = self.services.battery.snapshot().await;
        if !vaultline_device::evaluate(&snapshot).sync_permitted {
            return Some(SkipReason::BatteryTooLow);
        }

        if !periodic {
            return None;
        }

        let settings = match state.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "cannot read sync settings, ignoring constraints");
                return None;
            }
        };
        if !settings.enabled {
            Some(SkipReason::Disabled)
        } else if settings.require_wifi && network.metered {
            Some(SkipReason::MeteredNetwork)
        } else if settings.require_charging && !snapshot.is_charging() {
            Some(SkipReason::NotCharging)
        } else {
            None
        }
    }
}

impl From<&Result<SyncReport, VaultlineError>> for RunOutcome {
    fn from(result: &Result<SyncReport, VaultlineError>) -> Self {
        match result {
            Ok(report) => Self::Succeeded(*report),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}
