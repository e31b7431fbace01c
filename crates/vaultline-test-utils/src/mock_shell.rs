// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable in-memory shell transport.
//!
//! `MockShellConnector` counts connect attempts, can hold them in flight,
//! fail them, or reject authentication. Every opened shell is recorded so
//! tests can push output into it, hang it up, or inspect what the session
//! wrote.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};

use vaultline_core::{
    AuthMethod, ChannelOutput, OpenedShell, PtyRequest, ShellChannel, ShellConnector,
    ShellTransport, VaultlineError,
};

#[derive(Default)]
struct ConnectorState {
    connects: AtomicUsize,
    transport_closes: AtomicUsize,
    reject_auth: AtomicBool,
    fail_connect: Mutex<Option<String>>,
    shells: Mutex<Vec<MockShell>>,
}

struct MockShell {
    channel: Arc<MockShellChannel>,
    output: Option<mpsc::Sender<ChannelOutput>>,
    pty: PtyRequest,
}

/// A connector whose transports never touch the network.
#[derive(Clone)]
pub struct MockShellConnector {
    state: Arc<ConnectorState>,
    /// `true` while connects may proceed.
    gate: Arc<watch::Sender<bool>>,
}

impl MockShellConnector {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(ConnectorState::default()),
            gate: Arc::new(gate),
        }
    }

    /// Number of sockets opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn transport_close_count(&self) -> usize {
        self.state.transport_closes.load(Ordering::SeqCst)
    }

    /// Makes subsequent connects wait until [`Self::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Fails every connect with a connection error until cleared.
    pub async fn fail_connect_with(&self, message: Option<&str>) {
        *self.state.fail_connect.lock().await = message.map(str::to_string);
    }

    pub fn reject_auth(&self, reject: bool) {
        self.state.reject_auth.store(reject, Ordering::SeqCst);
    }

    pub async fn shell_count(&self) -> usize {
        self.state.shells.lock().await.len()
    }

    /// The channel of the most recently opened shell.
    pub async fn latest_channel(&self) -> Option<Arc<MockShellChannel>> {
        self.state
            .shells
            .lock()
            .await
            .last()
            .map(|s| Arc::clone(&s.channel))
    }

    pub async fn latest_pty(&self) -> Option<PtyRequest> {
        self.state.shells.lock().await.last().map(|s| s.pty.clone())
    }

    /// Pushes stdout bytes into the most recent shell.
    pub async fn emit_stdout(&self, bytes: &[u8]) {
        self.emit(ChannelOutput::Stdout(bytes.to_vec())).await;
    }

    pub async fn emit_stderr(&self, bytes: &[u8]) {
        self.emit(ChannelOutput::Stderr(bytes.to_vec())).await;
    }

    /// Closes the output side of the most recent shell, as if the remote
    /// host ended the session.
    pub async fn hang_up(&self) {
        if let Some(shell) = self.state.shells.lock().await.last_mut() {
            shell.output.take();
        }
    }

    async fn emit(&self, chunk: ChannelOutput) {
        let sender = self
            .state
            .shells
            .lock()
            .await
            .last()
            .and_then(|s| s.output.clone());
        if let Some(sender) = sender {
            let _ = sender.send(chunk).await;
        }
    }
}

impl Default for MockShellConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellConnector for MockShellConnector {
    async fn connect(
        &self,
        host: &str,
        _port: u16,
    ) -> Result<Box<dyn ShellTransport>, VaultlineError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        while !*gate.borrow_and_update() {
            if gate.changed().await.is_err() {
                break;
            }
        }

        if let Some(message) = self.state.fail_connect.lock().await.clone() {
            return Err(VaultlineError::Connection {
                message,
                source: None,
            });
        }

        Ok(Box::new(MockTransport {
            host: host.to_string(),
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct MockTransport {
    host: String,
    state: Arc<ConnectorState>,
    closed: bool,
}

#[async_trait]
impl ShellTransport for MockTransport {
    async fn authenticate(
        &mut self,
        username: &str,
        _auth: &AuthMethod,
    ) -> Result<(), VaultlineError> {
        if self.state.reject_auth.load(Ordering::SeqCst) {
            return Err(VaultlineError::AuthRejected {
                username: username.to_string(),
                host: self.host.clone(),
            });
        }
        Ok(())
    }

    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<OpenedShell, VaultlineError> {
        let (tx, rx) = mpsc::channel(64);
        let channel = Arc::new(MockShellChannel::default());
        self.state.shells.lock().await.push(MockShell {
            channel: Arc::clone(&channel),
            output: Some(tx),
            pty: pty.clone(),
        });
        Ok(OpenedShell {
            channel: Box::new(ChannelHandle(channel)),
            output: rx,
        })
    }

    async fn close(&mut self) -> Result<(), VaultlineError> {
        if !self.closed {
            self.closed = true;
            self.state.transport_closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Records everything a session does to its channel.
#[derive(Default)]
pub struct MockShellChannel {
    writes: Mutex<Vec<Vec<u8>>>,
    resizes: Mutex<Vec<(u16, u16)>>,
    keepalives: AtomicUsize,
    fail_writes: AtomicBool,
    fail_close: AtomicBool,
    closed: AtomicBool,
}

impl MockShellChannel {
    pub async fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().await.clone()
    }

    pub async fn resizes(&self) -> Vec<(u16, u16)> {
        self.resizes.lock().await.clone()
    }

    pub fn keepalive_count(&self) -> usize {
        self.keepalives.load(Ordering::SeqCst)
    }

    /// Makes every later write and keep-alive fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Makes `close` report an error after marking the channel closed.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), VaultlineError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.is_closed() {
            Err(VaultlineError::ChannelClosed)
        } else {
            Ok(())
        }
    }
}

struct ChannelHandle(Arc<MockShellChannel>);

#[async_trait]
impl ShellChannel for ChannelHandle {
    async fn write(&self, data: &[u8]) -> Result<(), VaultlineError> {
        self.0.check_writable()?;
        self.0.writes.lock().await.push(data.to_vec());
        Ok(())
    }

    async fn send_keepalive(&self) -> Result<(), VaultlineError> {
        self.0.check_writable()?;
        self.0.keepalives.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), VaultlineError> {
        self.0.check_writable()?;
        self.0.resizes.lock().await.push((cols, rows));
        Ok(())
    }

    async fn close(&self) -> Result<(), VaultlineError> {
        self.0.closed.store(true, Ordering::SeqCst);
        if self.0.fail_close.load(Ordering::SeqCst) {
            return Err(VaultlineError::ChannelClosed);
        }
        Ok(())
    }
}
