// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultline serve` command implementation.
//!
//! Runs the durable job daemon, connectivity polling, and (with the `ssh`
//! feature) a session registry holding persistent sessions. Sessions that
//! dropped while offline are reconnected when the network returns. Shuts
//! down on SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vaultline_config::VaultlineConfig;
use vaultline_core::VaultlineError;
use vaultline_storage::Database;
use vaultline_sync::JobDaemon;

use crate::platform::{ProcessLauncher, device_monitors};

#[cfg(feature = "ssh")]
use vaultline_core::SessionState;
#[cfg(feature = "ssh")]
use vaultline_device::{BatteryMonitor, ConnectivityMonitor};
#[cfg(feature = "ssh")]
use vaultline_session::{SessionDeps, SessionOptions, SessionRegistry, Ssh2Connector};
#[cfg(feature = "ssh")]
use crate::platform::{InhibitWakeLock, LogNotifier};

/// How often held sessions get a chance to restart a battery-stopped keep-alive.
#[cfg(feature = "ssh")]
const KEEP_ALIVE_REFRESH: Duration = Duration::from_secs(60);

/// Runs the `vaultline serve` command.
pub async fn run_serve(
    config: VaultlineConfig,
    config_path: Option<PathBuf>,
    #[cfg(feature = "ssh")] hold: Vec<String>,
    #[cfg(feature = "ssh")] key: Option<PathBuf>,
) -> Result<(), VaultlineError> {
    info!("starting vaultline serve");
    let cancel = install_signal_handler();

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    debug!(path = %config.storage.database_path, "database opened");
    let (battery, connectivity) = device_monitors(&config.device);
    let polling = connectivity.spawn_polling(
        Duration::from_secs(config.device.connectivity_poll_secs),
        cancel.clone(),
    );

    let daemon = Arc::new(JobDaemon::new(
        db,
        Arc::new(ProcessLauncher::current(config_path)?),
        battery.clone(),
        Arc::clone(&connectivity),
        Duration::from_secs(config.sync.max_job_runtime_secs),
    ));
    let daemon_task = daemon.spawn(Duration::from_secs(config.sync.job_poll_secs), cancel.clone());

    #[cfg(feature = "ssh")]
    let sessions = {
        let registry = Arc::new(build_registry(&config, battery));
        if !hold.is_empty() {
            let auth = crate::shell::AuthSource::load(key.as_deref()).await?;
            for target in &hold {
                let credential = crate::shell::parse_target(target, auth.method())?;
                let session = registry.create_session(credential, true).await;
                info!(session_id = %session.id(), "holding session");
            }
        }
        let supervisor = spawn_supervisor(Arc::clone(&registry), connectivity, cancel.clone());
        (registry, supervisor)
    };

    info!("vaultline serve ready");
    cancel.cancelled().await;
    info!("shutting down");

    #[cfg(feature = "ssh")]
    {
        let (registry, supervisor) = sessions;
        let _ = supervisor.await;
        let closed = registry.close_all_sessions().await;
        debug!(closed, "sessions closed");
    }

    let _ = daemon_task.await;
    let _ = polling.await;
    info!("vaultline serve stopped");
    Ok(())
}

#[cfg(feature = "ssh")]
pub(crate) fn build_registry(config: &VaultlineConfig, battery: BatteryMonitor) -> SessionRegistry {
    let options = SessionOptions::from(&config.session);
    let deps = SessionDeps {
        connector: Arc::new(Ssh2Connector::new(options.connect_timeout)),
        battery,
        options,
    };
    SessionRegistry::new(
        deps,
        Arc::new(LogNotifier::new()),
        Arc::new(InhibitWakeLock::systemd(&config.app.name)),
        config.app.name.clone(),
    )
}

/// Reconnects dropped sessions when the network comes back and periodically
/// refreshes keep-alive timers.
#[cfg(feature = "ssh")]
fn spawn_supervisor(
    registry: Arc<SessionRegistry>,
    connectivity: Arc<ConnectivityMonitor>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut changes = connectivity.changes();
        let mut refresh = tokio::time::interval(KEEP_ALIVE_REFRESH);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = refresh.tick() => registry.refresh_keep_alive_all().await,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *changes.borrow_and_update();
                    if status.connected {
                        info!(connection_type = %status.connection_type, "network available");
                        reconnect_dropped(&registry).await;
                        registry.refresh_keep_alive_all().await;
                    } else {
                        info!("network lost");
                    }
                }
            }
        }
        debug!("session supervisor stopped");
    })
}

#[cfg(feature = "ssh")]
async fn reconnect_dropped(registry: &SessionRegistry) {
    for session in registry.get_all_sessions() {
        if !matches!(session.state(), SessionState::Error | SessionState::Disconnected) {
            continue;
        }
        if let Err(e) = session.reconnect().await {
            tracing::warn!(session_id = %session.id(), error = %e, "reconnect failed");
        }
    }
}

/// Sets up the global tracing subscriber on stderr, so that command output
/// on stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vaultline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Returns a token that is cancelled on SIGINT, or SIGTERM on Unix.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot install SIGTERM handler");
                    let _ = ctrl_c.await;
                    info!("received SIGINT, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}
