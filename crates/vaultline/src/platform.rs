// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Desktop Linux implementations of the platform services: presence
//! notifications, the wake-lock, and isolated job launches.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use vaultline_config::model::DeviceConfig;
use vaultline_core::{PresenceNotifier, VaultlineError, WakeLock};
use vaultline_device::{BatteryMonitor, ConnectivityMonitor, SysfsBatteryProbe, SysfsNetworkProbe};
use vaultline_sync::JobLauncher;

/// Battery and connectivity monitors over the sysfs sensors.
pub fn device_monitors(device: &DeviceConfig) -> (BatteryMonitor, Arc<ConnectivityMonitor>) {
    let battery = BatteryMonitor::new(Arc::new(SysfsBatteryProbe::new(&device.sysfs_root)));
    let connectivity = Arc::new(ConnectivityMonitor::new(Arc::new(SysfsNetworkProbe::new(
        &device.sysfs_root,
    ))));
    (battery, connectivity)
}

/// Presence notifications for a headless host: each one is a log line.
#[derive(Debug, Default)]
pub struct LogNotifier {
    visible: Mutex<BTreeMap<u32, String>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn visible(&self) -> BTreeMap<u32, String> {
        self.visible.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PresenceNotifier for LogNotifier {
    async fn show(&self, id: u32, title: &str, body: &str) -> Result<(), VaultlineError> {
        info!(notification_id = id, title, body, "presence notification");
        self.visible
            .lock()
            .map_err(|_| VaultlineError::Internal("notifier lock poisoned".to_string()))?
            .insert(id, body.to_string());
        Ok(())
    }

    async fn cancel(&self, id: u32) -> Result<(), VaultlineError> {
        let removed = self
            .visible
            .lock()
            .map_err(|_| VaultlineError::Internal("notifier lock poisoned".to_string()))?
            .remove(&id);
        if removed.is_some() {
            debug!(notification_id = id, "presence notification cleared");
        }
        Ok(())
    }
}

/// Holds a sleep inhibitor by running a helper process for as long as the
/// lock is held. The default helper is `systemd-inhibit`.
#[derive(Debug)]
pub struct InhibitWakeLock {
    program: OsString,
    args: Vec<OsString>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl InhibitWakeLock {
    pub fn new(program: impl Into<OsString>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            child: tokio::sync::Mutex::new(None),
        }
    }

    pub fn systemd(app_name: &str) -> Self {
        let args = [
            "--what=sleep:idle".to_string(),
            format!("--who={app_name}"),
            "--why=persistent remote session".to_string(),
            "--mode=block".to_string(),
            "sleep".to_string(),
            "infinity".to_string(),
        ];
        Self::new("systemd-inhibit", args.into_iter().map(OsString::from).collect())
    }

    #[cfg(test)]
    async fn is_held(&self) -> bool {
        self.child.lock().await.is_some()
    }
}

#[async_trait]
impl WakeLock for InhibitWakeLock {
    async fn acquire(&self) -> Result<(), VaultlineError> {
        let mut child = self.child.lock().await;
        if child.is_some() {
            return Ok(());
        }
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VaultlineError::Internal(format!(
                    "cannot start {}: {e}",
                    self.program.to_string_lossy()
                ))
            })?;
        debug!(pid = ?spawned.id(), "sleep inhibitor started");
        *child = Some(spawned);
        Ok(())
    }

    async fn release(&self) -> Result<(), VaultlineError> {
        let Some(mut held) = self.child.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = held.kill().await {
            warn!(error = %e, "sleep inhibitor did not stop cleanly");
        }
        Ok(())
    }
}

/// Launches each job as `<exe> job <task>` in a child process. The child
/// inherits the environment, including the vault passphrase if set, and is
/// killed if the daemon gives up waiting for it.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    exe: PathBuf,
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self { exe, config_path }
    }

    /// Re-launches the running binary.
    pub fn current(config_path: Option<PathBuf>) -> Result<Self, VaultlineError> {
        let exe = std::env::current_exe()
            .map_err(|e| VaultlineError::Internal(format!("cannot locate executable: {e}")))?;
        Ok(Self::new(exe, config_path))
    }

    fn command(&self, task: &str) -> Command {
        let mut command = Command::new(&self.exe);
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }
        command
            .arg("job")
            .arg(task)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl JobLauncher for ProcessLauncher {
    async fn launch(&self, task: &str) -> Result<(), VaultlineError> {
        let started = std::time::Instant::now();
        let status = self
            .command(task)
            .status()
            .await
            .map_err(|e| VaultlineError::Scheduler(format!("cannot launch {task}: {e}")))?;
        debug!(task, elapsed = ?started.elapsed(), %status, "job process exited");
        if status.success() {
            Ok(())
        } else {
            Err(VaultlineError::Scheduler(format!("{task} exited with {status}")))
        }
    }
}
