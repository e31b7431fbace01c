// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote shell transport traits.
//!
//! A connection is established in three steps, mirroring the SSH handshake:
//! [`ShellConnector::connect`] opens the socket, [`ShellTransport::authenticate`]
//! proves identity, and [`ShellTransport::open_shell`] requests a PTY channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::VaultlineError;
use crate::types::{AuthMethod, PtyRequest};

/// A chunk of bytes read from an interactive channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutput {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// An interactive channel and the stream of output it produces.
///
/// The output receiver yields chunks in the order the remote wrote them and
/// ends when the remote closes the channel.
pub struct OpenedShell {
    pub channel: Box<dyn ShellChannel>,
    pub output: mpsc::Receiver<ChannelOutput>,
}

/// Opens transport sockets to remote hosts.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16)
    -> Result<Box<dyn ShellTransport>, VaultlineError>;
}

/// A connected, possibly not yet authenticated, transport.
#[async_trait]
pub trait ShellTransport: Send + Sync {
    async fn authenticate(
        &mut self,
        username: &str,
        auth: &AuthMethod,
    ) -> Result<(), VaultlineError>;

    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<OpenedShell, VaultlineError>;

    /// Closes the socket. Must tolerate being called on a dead transport.
    async fn close(&mut self) -> Result<(), VaultlineError>;
}

/// The input side of an interactive channel.
#[async_trait]
pub trait ShellChannel: Send + Sync {
    async fn write(&self, data: &[u8]) -> Result<(), VaultlineError>;

    /// Sends a no-op payload that keeps idle links from timing out.
    async fn send_keepalive(&self) -> Result<(), VaultlineError> {
        self.write(&[]).await
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), VaultlineError>;

    async fn close(&self) -> Result<(), VaultlineError>;
}
