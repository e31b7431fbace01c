// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A durable platform job scheduler.
//!
//! [`DurableJobScheduler`] stores registrations in the `scheduled_jobs`
//! table, so any process with access to the database can register or cancel
//! work. [`JobDaemon`] polls that table and launches due jobs through a
//! [`JobLauncher`], at most one execution per task at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use vaultline_core::{JobConstraints, JobScheduler, VaultlineError};
use vaultline_device::{BatteryMonitor, ConnectivityMonitor};
use vaultline_storage::jobs::{self, JobKind, ScheduledJob};
use vaultline_storage::Database;

#[derive(Debug, Clone)]
pub struct DurableJobScheduler {
    db: Database,
}

impl DurableJobScheduler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn registrations(&self) -> Result<Vec<ScheduledJob>, VaultlineError> {
        jobs::list_jobs(&self.db).await
    }
}

#[async_trait]
impl JobScheduler for DurableJobScheduler {
    async fn register_periodic(
        &self,
        task: &str,
        every: Duration,
        constraints: JobConstraints,
    ) -> Result<(), VaultlineError> {
        let interval_secs = i64::try_from(every.as_secs())
            .map_err(|_| VaultlineError::Scheduler(format!("interval too large for {task}")))?;
        if interval_secs <= 0 {
            return Err(VaultlineError::Scheduler(format!(
                "periodic interval for {task} must be positive"
            )));
        }

        // Keep the last launch so re-registering does not postpone the next run.
        let last_run_at = jobs::get_job(&self.db, task)
            .await?
            .filter(|existing| existing.kind == JobKind::Periodic)
            .and_then(|existing| existing.last_run_at);

        jobs::upsert_job(
            &self.db,
            &ScheduledJob {
                task: task.to_string(),
                kind: JobKind::Periodic,
                interval_secs: Some(interval_secs),
                constraints,
                registered_at: Utc::now().timestamp(),
                last_run_at,
            },
        )
        .await?;
        debug!(task, interval_secs, "periodic job registered");
        Ok(())
    }

    async fn register_one_off(&self, task: &str) -> Result<(), VaultlineError> {
        jobs::upsert_job(
            &self.db,
            &ScheduledJob {
                task: task.to_string(),
                kind: JobKind::OneOff,
                interval_secs: None,
                constraints: JobConstraints::default(),
                registered_at: Utc::now().timestamp(),
                last_run_at: None,
            },
        )
        .await?;
        debug!(task, "one-off job registered");
        Ok(())
    }

    async fn cancel(&self, task: &str) -> Result<(), VaultlineError> {
        if jobs::delete_job(&self.db, task).await? {
            debug!(task, "job cancelled");
        }
        Ok(())
    }
}

/// Starts one job execution in its own execution context and waits for it.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, task: &str) -> Result<(), VaultlineError>;
}

pub struct JobDaemon {
    db: Database,
    launcher: Arc<dyn JobLauncher>,
    battery: BatteryMonitor,
    connectivity: Arc<ConnectivityMonitor>,
    max_runtime: Duration,
    running: Arc<Mutex<HashSet<String>>>,
    tracker: TaskTracker,
}

impl JobDaemon {
    pub fn new(
        db: Database,
        launcher: Arc<dyn JobLauncher>,
        battery: BatteryMonitor,
        connectivity: Arc<ConnectivityMonitor>,
        max_runtime: Duration,
    ) -> Self {
        Self {
            db,
            launcher,
            battery,
            connectivity,
            max_runtime,
            running: Arc::new(Mutex::new(HashSet::new())),
            tracker: TaskTracker::new(),
        }
    }

    /// Tasks with an execution in flight.
    pub fn running(&self) -> Vec<String> {
        let mut tasks: Vec<String> = lock(&self.running).iter().cloned().collect();
        tasks.sort();
        tasks
    }

    /// Launches every job that is due at `now` (Unix seconds) and whose
    /// constraints hold. Returns the launched task names.
    pub async fn tick(&self, now: i64) -> Result<Vec<String>, VaultlineError> {
        let due: Vec<ScheduledJob> = jobs::list_jobs(&self.db)
            .await?
            .into_iter()
            .filter(|job| job.due_at() <= now)
            .filter(|job| !lock(&self.running).contains(&job.task))
            .collect();
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let network = self.connectivity.current_status();
        if !network.connected {
            debug!(due = due.len(), "jobs due but offline");
            return Ok(Vec::new());
        }
        let charging = self.battery.snapshot().await.is_charging();

        let mut launched = Vec::new();
        for job in due {
            if job.constraints.require_unmetered && network.metered {
                debug!(task = %job.task, "waiting for an unmetered network");
                continue;
            }
            if job.constraints.require_charging && !charging {
                debug!(task = %job.task, "waiting for charging");
                continue;
            }

            jobs::mark_launched(&self.db, &job, now).await?;
            if !lock(&self.running).insert(job.task.clone()) {
                continue;
            }
            self.spawn_execution(job.task.clone());
            launched.push(job.task);
        }
        Ok(launched)
    }

    /// Polls every `interval` until `cancel` fires, then waits up to the
    /// maximum job runtime for executions in flight.
    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick(Utc::now().timestamp()).await {
                            warn!(error = %e, "job daemon tick failed");
                        }
                    }
                }
            }
            self.shutdown().await;
        })
    }

    pub async fn shutdown(&self) {
        self.tracker.close();
        if tokio::time::timeout(self.max_runtime, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(running = ?self.running(), "jobs still running at shutdown");
        }
        info!("job daemon stopped");
    }

    fn spawn_execution(&self, task: String) {
        let launcher = Arc::clone(&self.launcher);
        let guard = RunningGuard {
            running: Arc::clone(&self.running),
            task: task.clone(),
        };
        let max_runtime = self.max_runtime;
        self.tracker.spawn(async move {
            let _guard = guard;
            info!(task = %task, "launching job");
            match tokio::time::timeout(max_runtime, launcher.launch(&task)).await {
                Ok(Ok(())) => debug!(task = %task, "job exited"),
                Ok(Err(e)) => error!(task = %task, error = %e, "job launch failed"),
                Err(_) => warn!(task = %task, ?max_runtime, "job exceeded its runtime"),
            }
        });
    }
}

/// Clears the in-flight marker even if the execution task is aborted.
struct RunningGuard {
    running: Arc<Mutex<HashSet<String>>>,
    task: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.task);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_core::{BatterySnapshot, ChargingState, ConnectionType};
    use vaultline_device::{StaticBatteryProbe, StaticNetworkProbe};

    struct CountingLauncher {
        launched: Mutex<Vec<String>>,
        hold: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl JobLauncher for CountingLauncher {
        async fn launch(&self, task: &str) -> Result<(), VaultlineError> {
            lock(&self.launched).push(task.to_string());
            let _permit = self.hold.acquire().await;
            Ok(())
        }
    }

    async fn fixture(
        transports: Vec<ConnectionType>,
        battery: BatterySnapshot,
    ) -> (
        tempfile::TempDir,
        DurableJobScheduler,
        JobDaemon,
        Arc<CountingLauncher>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("jobs.db")).await.unwrap();
        let launcher = Arc::new(CountingLauncher {
            launched: Mutex::new(Vec::new()),
            hold: tokio::sync::Semaphore::new(0),
        });
        let daemon = JobDaemon::new(
            db.clone(),
            launcher.clone(),
            BatteryMonitor::new(Arc::new(StaticBatteryProbe::new(battery))),
            Arc::new(ConnectivityMonitor::new(Arc::new(StaticNetworkProbe::new(
                transports,
            )))),
            Duration::from_secs(60),
        );
        (dir, DurableJobScheduler::new(db), daemon, launcher)
    }

    fn on_battery() -> BatterySnapshot {
        BatterySnapshot::new(80, ChargingState::Discharging)
    }

    #[tokio::test]
    async fn registering_twice_replaces_the_job() {
        let (_dir, scheduler, _daemon, _) = fixture(vec![ConnectionType::Wifi], on_battery()).await;
        let constraints = JobConstraints::default();
        scheduler
            .register_periodic("sync", Duration::from_secs(900), constraints)
            .await
            .unwrap();
        scheduler
            .register_periodic("sync", Duration::from_secs(1800), constraints)
            .await
            .unwrap();

        let jobs = scheduler.registrations().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].interval_secs, Some(1800));
    }

    #[tokio::test]
    async fn one_off_job_launches_once_and_is_consumed() {
        let (_dir, scheduler, daemon, launcher) =
            fixture(vec![ConnectionType::Wifi], on_battery()).await;
        scheduler.register_one_off("now").await.unwrap();

        let now = Utc::now().timestamp();
        assert_eq!(daemon.tick(now).await.unwrap(), vec!["now".to_string()]);
        assert!(scheduler.registrations().await.unwrap().is_empty());

        launcher.hold.add_permits(8);
        daemon.shutdown().await;
        assert_eq!(*lock(&launcher.launched), vec!["now".to_string()]);
    }

    #[tokio::test]
    async fn periodic_job_is_first_due_one_interval_after_registration() {
        let (_dir, scheduler, daemon, _) = fixture(vec![ConnectionType::Wifi], on_battery()).await;
        scheduler
            .register_periodic("sync", Duration::from_secs(900), JobConstraints::default())
            .await
            .unwrap();

        let now = Utc::now().timestamp();
        assert!(daemon.tick(now).await.unwrap().is_empty());
        assert_eq!(daemon.tick(now + 901).await.unwrap(), vec!["sync".to_string()]);
    }

    #[tokio::test]
    async fn a_task_never_runs_twice_at_once() {
        let (_dir, scheduler, daemon, launcher) =
            fixture(vec![ConnectionType::Wifi], on_battery()).await;
        scheduler
            .register_periodic("sync", Duration::from_secs(60), JobConstraints::default())
            .await
            .unwrap();

        let now = Utc::now().timestamp();
        assert_eq!(daemon.tick(now + 61).await.unwrap().len(), 1);
        assert!(daemon.tick(now + 200).await.unwrap().is_empty());
        assert_eq!(daemon.running(), vec!["sync".to_string()]);

        launcher.hold.add_permits(8);
        daemon.shutdown().await;
        assert!(daemon.running().is_empty());
    }

    #[tokio::test]
    async fn constraints_hold_jobs_back() {
        let (_dir, scheduler, daemon, _) =
            fixture(vec![ConnectionType::Cellular], on_battery()).await;
        scheduler
            .register_periodic(
                "wifi-only",
                Duration::from_secs(60),
                JobConstraints {
                    require_unmetered: true,
                    require_charging: false,
                },
            )
            .await
            .unwrap();
        scheduler
            .register_periodic(
                "plugged-in",
                Duration::from_secs(60),
                JobConstraints {
                    require_unmetered: false,
                    require_charging: true,
                },
            )
            .await
            .unwrap();

        let later = Utc::now().timestamp() + 120;
        assert!(daemon.tick(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nothing_launches_while_offline() {
        let (_dir, scheduler, daemon, _) = fixture(vec![], on_battery()).await;
        scheduler.register_one_off("now").await.unwrap();
        assert!(daemon.tick(Utc::now().timestamp()).await.unwrap().is_empty());
        assert_eq!(scheduler.registrations().await.unwrap().len(), 1);
    }
}
