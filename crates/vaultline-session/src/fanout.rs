// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish/subscribe fan-out of a session's output streams.
//!
//! Observers attach with [`OutputFanout::subscribe_stdout`] or
//! [`OutputFanout::subscribe_stderr`] and may drop their receiver at any
//! time without affecting the channel. The senders outlive individual
//! connections so an observer attached before a reconnect keeps receiving
//! after it; only [`OutputFanout::close`] ends the streams.

use std::sync::Mutex;

use tokio::sync::broadcast;

use vaultline_core::VaultlineError;

struct Senders {
    stdout: broadcast::Sender<Vec<u8>>,
    stderr: broadcast::Sender<Vec<u8>>,
}

pub struct OutputFanout {
    senders: Mutex<Option<Senders>>,
}

impl OutputFanout {
    /// `capacity` is the number of chunks buffered per observer. An observer
    /// that falls further behind sees `RecvError::Lagged` and skips ahead.
    pub fn new(capacity: usize) -> Self {
        let (stdout, _) = broadcast::channel(capacity.max(1));
        let (stderr, _) = broadcast::channel(capacity.max(1));
        Self {
            senders: Mutex::new(Some(Senders { stdout, stderr })),
        }
    }

    pub fn subscribe_stdout(&self) -> Result<broadcast::Receiver<Vec<u8>>, VaultlineError> {
        self.with_senders(|s| s.stdout.subscribe())
    }

    pub fn subscribe_stderr(&self) -> Result<broadcast::Receiver<Vec<u8>>, VaultlineError> {
        self.with_senders(|s| s.stderr.subscribe())
    }

    pub(crate) fn publish_stdout(&self, chunk: Vec<u8>) {
        // No observers is fine; the chunk is dropped.
        let _ = self.with_senders(|s| s.stdout.send(chunk));
    }

    pub(crate) fn publish_stderr(&self, chunk: Vec<u8>) {
        let _ = self.with_senders(|s| s.stderr.send(chunk));
    }

    /// Number of attached stdout observers.
    pub fn observer_count(&self) -> usize {
        self.with_senders(|s| s.stdout.receiver_count()).unwrap_or(0)
    }

    /// Ends both streams. Observers drain what is buffered, then see `Closed`.
    pub fn close(&self) {
        self.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn with_senders<T>(&self, f: impl FnOnce(&Senders) -> T) -> Result<T, VaultlineError> {
        self.lock().as_ref().map(f).ok_or(VaultlineError::ChannelClosed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Senders>> {
        self.senders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for OutputFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFanout")
            .field("closed", &self.is_closed())
            .field("observers", &self.observer_count())
            .finish()
    }
}
