// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single persistent interactive connection to one remote host.
//!
//! Every connection attempt is numbered. The attempt number ("epoch") is
//! bumped by `connect` and by `disconnect`, and every asynchronous
//! completion (a finished handshake, a failed keep-alive write, the remote
//! closing the channel) checks it before touching session state. A
//! completion that arrives after a newer attempt or a disconnect is released
//! and otherwise ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vaultline_config::model::SessionConfig;
use vaultline_core::{
    ChannelOutput, ConnectionCredential, OpenedShell, PtyRequest, SessionId, SessionState,
    ShellChannel, ShellConnector, ShellTransport, VaultlineError,
};
use vaultline_device::BatteryMonitor;

use crate::fanout::OutputFanout;

/// Per-session tunables, usually taken from the `[session]` config section.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub pty: PtyRequest,
    pub output_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            pty: PtyRequest {
                term: config.term.clone(),
                cols: config.cols,
                rows: config.rows,
            },
            output_buffer: config.output_buffer,
        }
    }
}

/// Collaborators shared by every session a registry creates.
#[derive(Clone)]
pub struct SessionDeps {
    pub connector: Arc<dyn ShellConnector>,
    pub battery: BatteryMonitor,
    pub options: SessionOptions,
}

/// Resources owned by one established connection. Released together.
struct LiveConnection {
    epoch: u64,
    transport: Box<dyn ShellTransport>,
    channel: Arc<dyn ShellChannel>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
}

impl LiveConnection {
    fn keepalive_running(&self) -> bool {
        self.keepalive.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop_tasks(&mut self) {
        self.cancel.cancel();
        self.pump.abort();
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }

    /// Stops the timer and the output pump, then closes the channel and the
    /// socket in that order.
    async fn release(mut self, session_id: &SessionId) {
        self.stop_tasks();
        close_connection(session_id, self.channel.as_ref(), self.transport.as_mut()).await;
    }
}

/// Closes the channel, then the socket. Failures are logged, not returned.
async fn close_connection(
    session_id: &SessionId,
    channel: &dyn ShellChannel,
    transport: &mut dyn ShellTransport,
) {
    if let Err(e) = channel.close().await {
        debug!(session_id = %session_id, error = %e, "channel close failed");
    }
    if let Err(e) = transport.close().await {
        debug!(session_id = %session_id, error = %e, "transport close failed");
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

/// One persistent connection session.
///
/// Created by the session registry. All methods take `&self`; the session is
/// shared as `Arc<ConnectionSession>` between the registry, UI observers and
/// its own background tasks (which hold only weak references).
pub struct ConnectionSession {
    id: SessionId,
    credential: Arc<ConnectionCredential>,
    created_at: DateTime<Utc>,
    persistent: bool,
    notification_id: Option<u32>,
    deps: SessionDeps,
    state_tx: watch::Sender<SessionState>,
    last_error: Mutex<Option<String>>,
    /// Guards attempt bookkeeping: the epoch counter and the token that
    /// cancels the in-flight attempt. Never held across an await.
    attempt: Mutex<CancellationToken>,
    epoch: AtomicU64,
    live: tokio::sync::Mutex<Option<LiveConnection>>,
    fanout: Arc<OutputFanout>,
    weak_self: Weak<ConnectionSession>,
}

impl ConnectionSession {
    pub fn new(
        id: SessionId,
        credential: Arc<ConnectionCredential>,
        persistent: bool,
        notification_id: Option<u32>,
        deps: SessionDeps,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        let fanout = Arc::new(OutputFanout::new(deps.options.output_buffer));
        Arc::new_cyclic(|weak_self| Self {
            id,
            credential,
            created_at: Utc::now(),
            persistent,
            notification_id,
            deps,
            state_tx,
            last_error: Mutex::new(None),
            attempt: Mutex::new(CancellationToken::new()),
            epoch: AtomicU64::new(0),
            live: tokio::sync::Mutex::new(None),
            fanout,
            weak_self: weak_self.clone(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn credential(&self) -> &ConnectionCredential {
        &self.credential
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn notification_id(&self) -> Option<u32> {
        self.notification_id
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Description of the failure that ended the most recent attempt.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn subscribe_output(&self) -> Result<broadcast::Receiver<Vec<u8>>, VaultlineError> {
        self.fanout.subscribe_stdout()
    }

    pub fn subscribe_errors(&self) -> Result<broadcast::Receiver<Vec<u8>>, VaultlineError> {
        self.fanout.subscribe_stderr()
    }

    /// Whether the keep-alive timer is currently running.
    pub async fn keep_alive_active(&self) -> bool {
        self.live
            .lock()
            .await
            .as_ref()
            .is_some_and(LiveConnection::keepalive_running)
    }

    /// Opens the socket, authenticates, and opens an interactive channel.
    ///
    /// A no-op while the session is connecting or connected. Failures are
    /// returned to the caller and leave the session in `Error`; they are not
    /// retried.
    pub async fn connect(&self) -> Result<(), VaultlineError> {
        let Some((epoch, cancel)) = self.begin_attempt() else {
            debug!(session_id = %self.id, state = %self.state(), "connect ignored, attempt already active");
            return Ok(());
        };

        info!(
            session_id = %self.id,
            target = %self.credential.identity(),
            epoch,
            "connecting"
        );

        let timeout = self.deps.options.connect_timeout;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VaultlineError::Cancelled(
                "connect superseded by disconnect".to_string(),
            )),
            opened = tokio::time::timeout(timeout, self.open()) => match opened {
                Ok(inner) => inner,
                Err(_) => Err(VaultlineError::Timeout { duration: timeout }),
            },
        };

        match result {
            Ok((transport, shell)) => self.install(epoch, cancel, transport, shell).await,
            Err(e) => {
                if self.finish_attempt(epoch, SessionState::Error) {
                    warn!(session_id = %self.id, error = %e, "connect failed");
                    *lock(&self.last_error) = Some(e.to_string());
                } else {
                    debug!(session_id = %self.id, error = %e, "stale connect attempt ended");
                }
                Err(e)
            }
        }
    }

    /// Re-enters `connect` from `Disconnected` or `Error`. Concurrent calls
    /// collapse into the attempt already in flight.
    pub async fn reconnect(&self) -> Result<(), VaultlineError> {
        if self.state().is_active() {
            debug!(session_id = %self.id, "reconnect skipped, already {}", self.state());
            return Ok(());
        }
        self.connect().await
    }

    /// Cancels any in-flight attempt, stops the keep-alive and output pump,
    /// closes the channel then the socket, and settles in `Disconnected`.
    /// Safe to call repeatedly and while `connect` is still running.
    pub async fn disconnect(&self) {
        let cutoff = {
            let attempt = lock(&self.attempt);
            attempt.cancel();
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        let live = {
            let mut guard = self.live.lock().await;
            if guard.as_ref().is_some_and(|l| l.epoch < cutoff) {
                guard.take()
            } else {
                None
            }
        };
        if let Some(live) = live {
            live.release(&self.id).await;
            info!(session_id = %self.id, "disconnected");
        }

        self.finish_attempt(cutoff, SessionState::Disconnected);
    }

    /// Disconnects and ends the output streams. The session cannot be used
    /// for output afterwards.
    pub async fn close(&self) {
        self.disconnect().await;
        self.fanout.close();
    }

    /// Sends raw bytes to the remote shell.
    pub async fn write_input(&self, data: &[u8]) -> Result<(), VaultlineError> {
        let channel = self.channel().await?;
        channel.write(data).await
    }

    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), VaultlineError> {
        let channel = self.channel().await?;
        channel.resize(cols, rows).await
    }

    /// Restarts the keep-alive timer if it stopped for battery reasons and
    /// the current policy permits it again.
    pub async fn refresh_keep_alive(&self) {
        let mut guard = self.live.lock().await;
        let Some(live) = guard.as_mut() else {
            return;
        };
        if live.keepalive_running() {
            return;
        }
        live.keepalive = self.start_keepalive(live).await;
    }

    fn begin_attempt(&self) -> Option<(u64, CancellationToken)> {
        let mut attempt = lock(&self.attempt);
        if self.state().is_active() {
            return None;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        *attempt = token.clone();
        self.set_state(SessionState::Connecting);
        Some((epoch, token))
    }

    /// Moves to `state` if `epoch` is still the latest attempt.
    fn finish_attempt(&self, epoch: u64, state: SessionState) -> bool {
        let _attempt = lock(&self.attempt);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.set_state(state);
        true
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(session_id = %self.id, from = %current, to = %state, "state transition");
                *current = state;
                true
            }
        });
    }

    async fn open(&self) -> Result<(Box<dyn ShellTransport>, OpenedShell), VaultlineError> {
        let credential = &self.credential;
        let mut transport = self
            .deps
            .connector
            .connect(&credential.host, credential.port)
            .await?;

        let opened = async {
            transport
                .authenticate(&credential.username, &credential.auth)
                .await?;
            transport.open_shell(&self.deps.options.pty).await
        }
        .await;

        match opened {
            Ok(shell) => Ok((transport, shell)),
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    debug!(session_id = %self.id, error = %close_err, "closing failed transport");
                }
                Err(e)
            }
        }
    }

    async fn install(
        &self,
        epoch: u64,
        cancel: CancellationToken,
        mut transport: Box<dyn ShellTransport>,
        shell: OpenedShell,
    ) -> Result<(), VaultlineError> {
        let channel: Arc<dyn ShellChannel> = Arc::from(shell.channel);
        let mut guard = self.live.lock().await;

        let current = {
            let _attempt = lock(&self.attempt);
            self.epoch.load(Ordering::SeqCst) == epoch
        };
        if !current {
            drop(guard);
            debug!(session_id = %self.id, epoch, "connect completed after disconnect, releasing");
            close_connection(&self.id, channel.as_ref(), transport.as_mut()).await;
            return Err(VaultlineError::Cancelled(
                "connect superseded by disconnect".to_string(),
            ));
        }

        if let Some(stale) = guard.take() {
            stale.release(&self.id).await;
        }

        let pump = tokio::spawn(pump_output(
            self.weak_self.clone(),
            shell.output,
            Arc::clone(&self.fanout),
            cancel.clone(),
            epoch,
        ));
        let mut live = LiveConnection {
            epoch,
            transport,
            channel,
            cancel,
            pump,
            keepalive: None,
        };
        live.keepalive = self.start_keepalive(&live).await;
        *guard = Some(live);

        if self.finish_attempt(epoch, SessionState::Connected) {
            *lock(&self.last_error) = None;
            info!(session_id = %self.id, target = %self.credential.identity(), "connected");
        }
        Ok(())
    }

    async fn start_keepalive(&self, live: &LiveConnection) -> Option<JoinHandle<()>> {
        let Some(period) = self.deps.battery.keep_alive_interval().await else {
            info!(session_id = %self.id, "keep-alive not started, battery policy refuses it");
            return None;
        };
        debug!(session_id = %self.id, period_secs = period.as_secs(), "keep-alive started");
        Some(tokio::spawn(keepalive_loop(
            self.weak_self.clone(),
            self.deps.battery.clone(),
            Arc::clone(&live.channel),
            live.cancel.clone(),
            live.epoch,
            period,
        )))
    }

    async fn channel(&self) -> Result<Arc<dyn ShellChannel>, VaultlineError> {
        self.live
            .lock()
            .await
            .as_ref()
            .map(|l| Arc::clone(&l.channel))
            .ok_or(VaultlineError::ChannelClosed)
    }

    /// Tears down the connection from `epoch` if it is still the live one.
    async fn teardown(&self, epoch: u64, reason: &str) {
        let live = {
            let mut guard = self.live.lock().await;
            if guard.as_ref().is_some_and(|l| l.epoch == epoch) {
                guard.take()
            } else {
                None
            }
        };
        let Some(live) = live else {
            return;
        };
        info!(session_id = %self.id, reason, "connection lost");
        *lock(&self.last_error) = Some(reason.to_string());
        self.finish_attempt(epoch, SessionState::Disconnected);
        live.release(&self.id).await;
    }

    /// Runs `teardown` on a separate task so that the calling task, which
    /// `teardown` aborts, is not cut off halfway through.
    fn spawn_teardown(weak: &Weak<Self>, epoch: u64, reason: String) {
        if let Some(session) = weak.upgrade() {
            tokio::spawn(async move { session.teardown(epoch, &reason).await });
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("target", &self.credential.identity())
            .field("state", &self.state())
            .field("persistent", &self.persistent)
            .finish()
    }
}

async fn pump_output(
    weak: Weak<ConnectionSession>,
    mut output: mpsc::Receiver<ChannelOutput>,
    fanout: Arc<OutputFanout>,
    cancel: CancellationToken,
    epoch: u64,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            chunk = output.recv() => match chunk {
                Some(ChannelOutput::Stdout(bytes)) => fanout.publish_stdout(bytes),
                Some(ChannelOutput::Stderr(bytes)) => fanout.publish_stderr(bytes),
                None => {
                    ConnectionSession::spawn_teardown(&weak, epoch, "remote closed the channel".to_string());
                    return;
                }
            },
        }
    }
}

/// Ticks are strictly sequential: the next sleep starts only after the
/// previous write completed. The cadence follows the battery policy as it
/// changes; an ineligible reading stops the loop.
async fn keepalive_loop(
    weak: Weak<ConnectionSession>,
    battery: BatteryMonitor,
    channel: Arc<dyn ShellChannel>,
    cancel: CancellationToken,
    epoch: u64,
    first_period: Duration,
) {
    let mut period = first_period;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(period) => {}
        }

        match battery.keep_alive_interval().await {
            Some(next) => period = next,
            None => {
                info!("keep-alive stopped, battery policy no longer permits it");
                return;
            }
        }

        if let Err(e) = channel.send_keepalive().await {
            warn!(error = %e, "keep-alive write failed");
            ConnectionSession::spawn_teardown(&weak, epoch, format!("keep-alive failed: {e}"));
            return;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_session_config() {
        let config = SessionConfig {
            connect_timeout_secs: 7,
            term: "vt100".to_string(),
            cols: 132,
            rows: 50,
            output_buffer: 32,
        };
        let options = SessionOptions::from(&config);
        assert_eq!(options.connect_timeout, Duration::from_secs(7));
        assert_eq!(options.pty.term, "vt100");
        assert_eq!((options.pty.cols, options.pty.rows), (132, 50));
        assert_eq!(options.output_buffer, 32);
    }
}
