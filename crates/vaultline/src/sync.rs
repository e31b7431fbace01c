// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultline sync` subcommands. Each one unlocks the vault, loads a fresh
//! context and talks to the scheduler in the foreground.

use std::sync::Arc;

use clap::Subcommand;
use tracing::debug;

use vaultline_config::VaultlineConfig;
use vaultline_core::types::DEFAULT_SYNC_INTERVAL_MINUTES;
use vaultline_core::{SyncReport, SyncSettings, VaultlineError};
use vaultline_storage::Database;
use vaultline_sync::{
    DurableJobScheduler, StorageContextLoader, SyncContext, SyncScheduler, SyncServices,
};

use crate::platform::device_monitors;
use crate::status;

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Enable periodic sync.
    Enable {
        /// Minutes between runs, clamped to 15..=360.
        #[arg(long, default_value_t = DEFAULT_SYNC_INTERVAL_MINUTES)]
        interval: u32,
        /// Only run on an unmetered network.
        #[arg(long)]
        wifi_only: bool,
        /// Only run while charging.
        #[arg(long)]
        charging_only: bool,
    },
    /// Disable periodic sync, keeping the other settings.
    Disable,
    /// Run one sync now, in this process.
    Now,
    /// Ask the job daemon to run a sync as soon as it can.
    Trigger,
    /// Show settings, history and device state.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Re-register the periodic job with the interval the battery suggests.
    Adapt,
}

/// Scheduler and device services shared by foreground and background runs.
pub async fn sync_services(config: &VaultlineConfig) -> Result<SyncServices, VaultlineError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let (battery, connectivity) = device_monitors(&config.device);
    Ok(SyncServices {
        jobs: Arc::new(DurableJobScheduler::new(db)),
        battery,
        connectivity,
    })
}

async fn open_scheduler(config: &VaultlineConfig) -> Result<SyncScheduler, VaultlineError> {
    let passphrase = vaultline_vault::get_vault_passphrase()?;
    let loader = StorageContextLoader::new(
        config.storage.clone(),
        config.sync.clone(),
        Some(passphrase),
    );
    let ctx = SyncContext::load(&loader).await?;
    Ok(SyncScheduler::new(ctx, sync_services(config).await?))
}

pub async fn run_sync(config: &VaultlineConfig, command: SyncCommand) -> Result<(), VaultlineError> {
    let scheduler = open_scheduler(config).await?;
    debug!(?command, "running sync command");

    match command {
        SyncCommand::Enable {
            interval,
            wifi_only,
            charging_only,
        } => {
            let settings = scheduler
                .set_enabled(true, interval, wifi_only, charging_only)
                .await?;
            println!("sync enabled: {}", describe_settings(&settings));
        }
        SyncCommand::Disable => {
            let current = scheduler.settings().await?;
            scheduler
                .set_enabled(
                    false,
                    current.interval_minutes,
                    current.require_wifi,
                    current.require_charging,
                )
                .await?;
            println!("sync disabled");
        }
        SyncCommand::Now => {
            let report = scheduler.run_now().await?;
            println!("sync complete: {}", describe_report(&report));
        }
        SyncCommand::Trigger => {
            scheduler.trigger_immediate_sync().await?;
            println!("sync requested; the job daemon will run it when the network allows");
        }
        SyncCommand::Status { json } => {
            let sync_status = scheduler.status().await?;
            if json {
                println!("{}", status::to_json(&sync_status));
            } else {
                status::print_sync(&sync_status, false);
            }
        }
        SyncCommand::Adapt => match scheduler.adapt_interval().await? {
            Some(minutes) => println!("sync interval changed to {minutes} min"),
            None => println!("sync interval unchanged"),
        },
    }
    Ok(())
}

pub fn describe_settings(settings: &SyncSettings) -> String {
    let mut text = format!("every {} min", settings.interval_minutes);
    if settings.require_wifi {
        text.push_str(", unmetered network only");
    }
    if settings.require_charging {
        text.push_str(", while charging only");
    }
    text
}

fn describe_report(report: &SyncReport) -> String {
    format!(
        "{} pushed, {} pulled, {} conflicts",
        report.pushed, report.pulled, report.conflicts
    )
}
