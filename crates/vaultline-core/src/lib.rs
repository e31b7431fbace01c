// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Vaultline session and sync runtime.
//!
//! This crate provides the error type, the shared domain types, and the
//! collaborator traits ("ports") that the session manager, the device
//! policy layer and the background sync scheduler are written against.
//! Concrete adapters (SQLite stores, sysfs sensors, SSH transports, the
//! remote object store client) live in their own crates.

pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

pub use error::VaultlineError;
pub use types::{
    AuthMethod, BatteryOptimizationStatus, BatteryPolicy, BatterySnapshot, ChargingState,
    ConnectionCredential, ConnectionType, ConnectivityStatus, JobConstraints, PtyRequest,
    SessionId, SessionState, SyncCredentials, SyncOutcomeHistory, SyncReport, SyncSettings,
};

pub use traits::{
    BatteryProbe, ChannelOutput, JobCompletion, JobScheduler, KeyValueStore, NetworkProbe,
    OpenedShell, PresenceNotifier, RemoteObjectStore, ShellChannel, ShellConnector,
    ShellTransport, SyncEngine, SyncEngineFactory, WakeLock,
};
