// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Vaultline runtime.

use thiserror::Error;

/// Returned by every fallible operation in the workspace.
#[derive(Debug, Error)]
pub enum VaultlineError {
    /// A setting was rejected after the config loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// SQLite open, migration or query failure.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Credential vault errors (wrong passphrase, corrupt ciphertext, locked vault).
    #[error("vault error: {0}")]
    Vault(String),

    /// Transport-level connection failure (socket, handshake, channel open).
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote host refused the supplied credentials.
    #[error("authentication rejected for {username}@{host}")]
    AuthRejected { username: String, host: String },

    /// The interactive channel was closed by the remote side or torn down locally.
    #[error("channel closed")]
    ChannelClosed,

    /// An in-flight operation was abandoned because the owner tore it down.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// No session is registered under the requested id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The platform job scheduler rejected a registration or cancellation.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// The sync component failed during initialize, sync or dispose.
    #[error("sync failed: {message}")]
    Sync {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote object store answered with an error.
    #[error("remote store error: {message}")]
    Remote { message: String, status: Option<u16> },

    /// Required credentials are absent from durable storage.
    #[error("{0} not configured")]
    CredentialsMissing(String),

    /// No network transport is available.
    #[error("no network connectivity")]
    Offline,

    /// A broken invariant or an I/O failure with no better home.
    #[error("internal error: {0}")]
    Internal(String),
}
