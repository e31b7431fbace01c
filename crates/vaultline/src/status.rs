// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultline status` command implementation.
//!
//! Reads the persisted sync settings and history, samples the battery and
//! network sensors, and lists the durable job registrations. Needs no vault
//! passphrase.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vaultline_config::VaultlineConfig;
use vaultline_core::VaultlineError;
use vaultline_storage::{Database, JobKind, ScheduledJob};
use vaultline_sync::{ContextLoader, DurableJobScheduler, StorageContextLoader, SyncStatus};

use crate::platform::device_monitors;
use crate::sync::describe_settings;

/// One durable job registration, as shown to the user.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub task: String,
    pub kind: String,
    pub interval_minutes: Option<i64>,
    pub next_due: Option<DateTime<Utc>>,
    pub require_unmetered: bool,
    pub require_charging: bool,
}

impl From<&ScheduledJob> for JobSummary {
    fn from(job: &ScheduledJob) -> Self {
        Self {
            task: job.task.clone(),
            kind: job.kind.to_string(),
            interval_minutes: match job.kind {
                JobKind::Periodic => job.interval_secs.map(|s| s / 60),
                JobKind::OneOff => None,
            },
            next_due: DateTime::from_timestamp(job.due_at(), 0),
            require_unmetered: job.constraints.require_unmetered,
            require_charging: job.constraints.require_charging,
        }
    }
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub sync: SyncStatus,
    pub jobs: Vec<JobSummary>,
}

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Runs the `vaultline status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &VaultlineConfig,
    json: bool,
    plain: bool,
) -> Result<(), VaultlineError> {
    let loader = StorageContextLoader::new(config.storage.clone(), config.sync.clone(), None);
    let state = loader.open_state().await?;
    let (battery, connectivity) = device_monitors(&config.device);
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let jobs = DurableJobScheduler::new(db).registrations().await?;

    let response = StatusResponse {
        sync: SyncStatus {
            settings: state.load_settings().await?,
            history: state.load_history().await?,
            battery: battery.optimization_status().await,
            connectivity: connectivity.current_status(),
        },
        jobs: jobs.iter().map(JobSummary::from).collect(),
    };

    if json {
        println!("{}", to_json(&response));
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_sync(&response.sync, use_color);
        print_jobs(&response.jobs);
    }
    Ok(())
}

/// Prints settings, last outcome and device state.
pub fn print_sync(status: &SyncStatus, use_color: bool) {
    println!();
    println!("  vaultline status");
    println!("  {}", "-".repeat(35));

    let schedule = if status.settings.enabled {
        describe_settings(&status.settings)
    } else {
        "disabled".to_string()
    };
    println!("    Sync:         {schedule}");

    let history = &status.history;
    let outcome = match (history.last_sync, history.last_sync_success) {
        (Some(at), Some(success)) => {
            let age = format_age((Utc::now() - at).num_seconds().max(0).unsigned_abs());
            let mark = match (success, use_color) {
                (true, true) => {
                    use colored::Colorize;
                    "✓".green().to_string()
                }
                (false, true) => {
                    use colored::Colorize;
                    "✗".red().to_string()
                }
                (true, false) => "[OK]".to_string(),
                (false, false) => "[FAIL]".to_string(),
            };
            format!("{mark} {age} ago")
        }
        _ => "never".to_string(),
    };
    println!("    Last sync:    {outcome}");
    if let Some(error) = &history.last_sync_error {
        println!("    Last error:   {error}");
    }
    if history.consecutive_failures > 0 {
        println!("    Failures:     {} in a row", history.consecutive_failures);
    }

    let battery = &status.battery;
    println!(
        "    Battery:      {}%{}{}",
        battery.level,
        if battery.charging { ", charging" } else { "" },
        if battery.low_power { ", power saver" } else { "" },
    );
    println!(
        "    Recommended:  every {} min{}",
        battery.recommended_interval_minutes,
        if battery.should_optimize { " (optimizing)" } else { "" }
    );

    let network = &status.connectivity;
    if network.connected {
        println!(
            "    Network:      {}{}",
            network.connection_type,
            if network.metered { " (metered)" } else { "" }
        );
    } else if use_color {
        use colored::Colorize;
        println!("    Network:      {}", "offline".red());
    } else {
        println!("    Network:      offline");
    }
    println!();
}

fn print_jobs(jobs: &[JobSummary]) {
    if jobs.is_empty() {
        println!("  No scheduled jobs.");
        println!();
        return;
    }
    println!("  Scheduled jobs");
    println!("  {}", "-".repeat(35));
    for job in jobs {
        let due = job
            .next_due
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("    {:<28} {:<9} next {due}", job.task, job.kind);
    }
    println!();
}

/// Format seconds into a short human-readable duration.
fn format_age(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_core::{
        BatteryOptimizationStatus, ConnectionType, ConnectivityStatus, JobConstraints,
        SyncOutcomeHistory, SyncSettings,
    };

    fn sync_status() -> SyncStatus {
        SyncStatus {
            settings: SyncSettings::default(),
            history: SyncOutcomeHistory::default(),
            battery: BatteryOptimizationStatus {
                level: 42,
                charging: false,
                low_power: false,
                should_optimize: true,
                recommended_interval_minutes: 120,
            },
            connectivity: ConnectivityStatus {
                connected: true,
                connection_type: ConnectionType::Wifi,
                metered: false,
            },
        }
    }

    #[test]
    fn format_age_units() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(120), "2m");
        assert_eq!(format_age(3720), "1h 2m");
        assert_eq!(format_age(90060), "1d 1h");
    }

    #[test]
    fn periodic_job_summary() {
        let job = ScheduledJob {
            task: "vaultline.sync.periodic".to_string(),
            kind: JobKind::Periodic,
            interval_secs: Some(7200),
            constraints: JobConstraints {
                require_unmetered: true,
                require_charging: false,
            },
            registered_at: 1_700_000_000,
            last_run_at: None,
        };

        let summary = JobSummary::from(&job);

        assert_eq!(summary.kind, "periodic");
        assert_eq!(summary.interval_minutes, Some(120));
        assert_eq!(summary.next_due.map(|d| d.timestamp()), Some(1_700_007_200));
        assert!(summary.require_unmetered);
    }

    #[test]
    fn status_response_flattens_sync_status() {
        let response = StatusResponse {
            sync: sync_status(),
            jobs: Vec::new(),
        };
        let value: serde_json::Value = serde_json::from_str(&to_json(&response)).unwrap();

        assert_eq!(value["settings"]["enabled"], false);
        assert_eq!(value["battery"]["recommended_interval_minutes"], 120);
        assert_eq!(value["connectivity"]["connection_type"], "wifi");
        assert!(value["jobs"].as_array().unwrap().is_empty());
    }
}
