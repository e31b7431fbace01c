// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync scheduling policy.
//!
//! The scheduler owns the persisted settings, drives registrations with the
//! platform job scheduler, and decides the adaptive interval. The same type
//! serves the foreground (settings screens, "sync now") and each background
//! run, which builds its own instance from a freshly loaded context.

use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, warn};

use vaultline_core::keys;
use vaultline_core::types::clamp_interval;
use vaultline_core::{
    BatteryOptimizationStatus, ConnectivityStatus, SyncCredentials, SyncOutcomeHistory,
    SyncReport, SyncSettings, VaultlineError,
};

use crate::context::{SyncContext, SyncServices};

/// Platform task name of the periodic sync job.
pub const SYNC_TASK_NAME: &str = "vaultline.sync.periodic";

/// Platform task name of the out-of-band sync job.
pub const IMMEDIATE_TASK_NAME: &str = "vaultline.sync.immediate";

/// Failure count above which every failed run re-evaluates the interval.
pub const BACKOFF_FAILURE_THRESHOLD: u32 = 3;

/// Snapshot for status screens.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub settings: SyncSettings,
    pub history: SyncOutcomeHistory,
    pub battery: BatteryOptimizationStatus,
    pub connectivity: ConnectivityStatus,
}

#[derive(Clone)]
pub struct SyncScheduler {
    ctx: SyncContext,
    services: SyncServices,
}

impl SyncScheduler {
    pub fn new(ctx: SyncContext, services: SyncServices) -> Self {
        Self { ctx, services }
    }

    pub async fn settings(&self) -> Result<SyncSettings, VaultlineError> {
        self.ctx.state.load_settings().await
    }

    pub async fn history(&self) -> Result<SyncOutcomeHistory, VaultlineError> {
        self.ctx.state.load_history().await
    }

    pub async fn battery_status(&self) -> BatteryOptimizationStatus {
        self.services.battery.optimization_status().await
    }

    pub fn connectivity_status(&self) -> ConnectivityStatus {
        self.services.connectivity.current_status()
    }

    pub async fn status(&self) -> Result<SyncStatus, VaultlineError> {
        Ok(SyncStatus {
            settings: self.settings().await?,
            history: self.history().await?,
            battery: self.battery_status().await,
            connectivity: self.connectivity_status(),
        })
    }

    /// Persists the settings and registers or cancels the periodic job.
    ///
    /// The interval is clamped to the supported range. Registering replaces
    /// any earlier registration of the periodic task.
    pub async fn set_enabled(
        &self,
        enabled: bool,
        interval_minutes: u32,
        require_wifi: bool,
        require_charging: bool,
    ) -> Result<SyncSettings, VaultlineError> {
        let settings = SyncSettings {
            enabled,
            interval_minutes: clamp_interval(interval_minutes),
            require_wifi,
            require_charging,
        };
        if settings.interval_minutes != interval_minutes {
            debug!(
                requested = interval_minutes,
                effective = settings.interval_minutes,
                "sync interval clamped"
            );
        }
        self.apply(&settings).await?;
        info!(
            enabled,
            interval_minutes = settings.interval_minutes,
            require_wifi,
            require_charging,
            "sync settings updated"
        );
        Ok(settings)
    }

    /// Asks the platform to run a sync as soon as it can.
    pub async fn trigger_immediate_sync(&self) -> Result<(), VaultlineError> {
        self.services.jobs.register_one_off(IMMEDIATE_TASK_NAME).await?;
        info!("immediate sync requested");
        Ok(())
    }

    /// Runs one sync attempt in the calling context and records the outcome.
    ///
    /// Fails with [`VaultlineError::Offline`] without recording anything when
    /// there is no network. The battery gate is not applied: the caller
    /// asked for this run explicitly.
    pub async fn run_now(&self) -> Result<SyncReport, VaultlineError> {
        if !self.connectivity_status().connected {
            return Err(VaultlineError::Offline);
        }
        let result = self.attempt().await;
        if let Err(e) = self.record_outcome(&result).await {
            warn!(error = %e, "failed to record sync outcome");
        }
        result
    }

    /// Re-registers the periodic job with the interval the battery policy
    /// recommends, if sync is enabled and the interval actually changes.
    /// Returns the new interval when a change was made.
    pub async fn adapt_interval(&self) -> Result<Option<u32>, VaultlineError> {
        let settings = self.settings().await?;
        if !settings.enabled {
            debug!("sync disabled, interval not adapted");
            return Ok(None);
        }

        let recommended = clamp_interval(self.services.battery.recommended_sync_interval().await);
        if recommended == settings.interval_minutes {
            debug!(interval_minutes = recommended, "sync interval already matches policy");
            return Ok(None);
        }

        self.apply(&SyncSettings {
            interval_minutes: recommended,
            ..settings
        })
        .await?;
        info!(
            from = settings.interval_minutes,
            to = recommended,
            "sync interval adapted"
        );
        Ok(Some(recommended))
    }

    /// Loads credentials and the root key, builds the sync component, and
    /// runs exactly one attempt. The component is disposed on every path.
    pub(crate) async fn attempt(&self) -> Result<SyncReport, VaultlineError> {
        let credentials = self.load_credentials().await?;
        let root_key = self
            .ctx
            .vault
            .credentials
            .get(keys::ROOT_KEY)
            .await?
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VaultlineError::CredentialsMissing("root key".to_string()))?;

        let mut engine = self
            .ctx
            .vault
            .engines
            .create(credentials, SecretString::from(root_key))
            .await?;

        let result = async {
            engine.initialize().await?;
            engine.sync().await
        }
        .await;

        if let Err(e) = engine.dispose().await {
            warn!(error = %e, "failed to dispose sync component");
        }
        result
    }

    /// Writes the outcome into history and applies the failure backoff.
    ///
    /// A success that ends a backoff streak re-evaluates the interval too,
    /// so an interval lengthened by failures does not stay inflated.
    pub(crate) async fn record_outcome(
        &self,
        result: &Result<SyncReport, VaultlineError>,
    ) -> Result<(), VaultlineError> {
        let now = Utc::now();
        match result {
            Ok(report) => {
                let previous_failures = self.ctx.state.record_success(now).await?;
                info!(
                    pushed = report.pushed,
                    pulled = report.pulled,
                    conflicts = report.conflicts,
                    "sync succeeded"
                );
                if previous_failures > BACKOFF_FAILURE_THRESHOLD {
                    info!(previous_failures, "failure streak ended, re-evaluating interval");
                    self.adapt_interval().await?;
                }
            }
            Err(e) => {
                let failures = self.ctx.state.record_failure(now, &e.to_string()).await?;
                warn!(failures, error = %e, "sync failed");
                if failures > BACKOFF_FAILURE_THRESHOLD {
                    info!(failures, "backing off after repeated failures");
                    self.adapt_interval().await?;
                }
            }
        }
        Ok(())
    }

    async fn load_credentials(&self) -> Result<SyncCredentials, VaultlineError> {
        let store = &self.ctx.vault.credentials;
        let token = store.get(keys::GITHUB_TOKEN).await?;
        let owner = store.get(keys::GITHUB_OWNER).await?;
        let repo = store.get(keys::GITHUB_REPO).await?;

        match (token, owner, repo) {
            (Some(token), Some(owner), Some(repo))
                if !token.is_empty() && !owner.is_empty() && !repo.is_empty() =>
            {
                Ok(SyncCredentials {
                    token: SecretString::from(token),
                    owner,
                    repo,
                })
            }
            _ => Err(VaultlineError::CredentialsMissing("credentials".to_string())),
        }
    }

    async fn apply(&self, settings: &SyncSettings) -> Result<(), VaultlineError> {
        self.ctx.state.save_settings(settings).await?;
        if settings.enabled {
            self.services
                .jobs
                .register_periodic(
                    SYNC_TASK_NAME,
                    Duration::from_secs(u64::from(settings.interval_minutes) * 60),
                    settings.constraints(),
                )
                .await
        } else {
            self.services.jobs.cancel(SYNC_TASK_NAME).await
        }
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler").finish_non_exhaustive()
    }
}
