// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session manager, device policy and sync scheduler.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Shortest permitted periodic sync interval, in minutes.
pub const MIN_SYNC_INTERVAL_MINUTES: u32 = 15;

/// Longest permitted periodic sync interval, in minutes.
pub const MAX_SYNC_INTERVAL_MINUTES: u32 = 360;

/// Baseline periodic sync interval, in minutes.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 60;

/// Clamps a requested sync interval into the permitted range.
pub fn clamp_interval(minutes: u32) -> u32 {
    minutes.clamp(MIN_SYNC_INTERVAL_MINUTES, MAX_SYNC_INTERVAL_MINUTES)
}

/// Unique identifier for a connection session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How a session proves its identity to the remote host.
#[derive(Debug)]
pub enum AuthMethod {
    Password(SecretString),
    /// An in-memory private key in OpenSSH or PEM format.
    Key {
        private_key: SecretString,
        passphrase: Option<SecretString>,
    },
}

/// Connection parameters for one remote host. Owned by credential storage and
/// read-only to the session layer.
#[derive(Debug)]
pub struct ConnectionCredential {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
}

impl ConnectionCredential {
    /// `user@host:port`, the identity sessions are derived from.
    pub fn identity(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Whether `other` targets the same account on the same endpoint.
    pub fn same_target(&self, other: &ConnectionCredential) -> bool {
        self.host == other.host && self.port == other.port && self.username == other.username
    }
}

/// Pseudo-terminal parameters requested when opening an interactive channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u16,
    pub rows: u16,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term: "xterm-256color".to_string(),
            cols: 80,
            rows: 24,
        }
    }
}

/// Lifecycle of a connection session.
///
/// `Disconnected` and `Error` end a connection attempt, not the session:
/// both are re-enterable through `reconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl SessionState {
    /// Whether a connect or reconnect must collapse into the attempt already underway.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// Charging state as reported by the battery sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChargingState {
    Charging,
    Full,
    Discharging,
    NotCharging,
    Unknown,
}

impl ChargingState {
    /// Charging and full both count as "on external power".
    pub fn is_charging(self) -> bool {
        matches!(self, Self::Charging | Self::Full)
    }
}

/// A single battery sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatterySnapshot {
    /// Charge level, 0-100.
    pub level: u8,
    pub state: ChargingState,
    pub low_power: bool,
}

impl BatterySnapshot {
    /// Reading used when the sensor cannot be queried.
    pub const UNKNOWN: BatterySnapshot = BatterySnapshot {
        level: 100,
        state: ChargingState::Unknown,
        low_power: false,
    };

    pub fn new(level: u8, state: ChargingState) -> Self {
        Self {
            level: level.min(100),
            state,
            low_power: false,
        }
    }

    pub fn is_charging(&self) -> bool {
        self.state.is_charging()
    }
}

/// Decisions derived from one battery snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryPolicy {
    pub sync_permitted: bool,
    /// Keep-alive cadence, or `None` when keep-alive is refused.
    pub keep_alive: Option<Duration>,
    pub recommended_interval_minutes: u32,
}

/// Battery status as surfaced to settings screens. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryOptimizationStatus {
    pub level: u8,
    pub charging: bool,
    pub low_power: bool,
    pub should_optimize: bool,
    pub recommended_interval_minutes: u32,
}

/// Physical or virtual transport backing the active network link.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Ethernet,
    Vpn,
    Cellular,
    None,
}

/// Network reachability snapshot. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub connected: bool,
    pub connection_type: ConnectionType,
    pub metered: bool,
}

impl ConnectivityStatus {
    pub const OFFLINE: ConnectivityStatus = ConnectivityStatus {
        connected: false,
        connection_type: ConnectionType::None,
        metered: true,
    };
}

/// Constraints attached to a platform job registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobConstraints {
    pub require_unmetered: bool,
    pub require_charging: bool,
}

/// Persisted background sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub enabled: bool,
    pub interval_minutes: u32,
    pub require_wifi: bool,
    pub require_charging: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            require_wifi: false,
            require_charging: false,
        }
    }
}

impl SyncSettings {
    pub fn constraints(&self) -> JobConstraints {
        JobConstraints {
            require_unmetered: self.require_wifi,
            require_charging: self.require_charging,
        }
    }
}

/// Persisted record of recent sync runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncOutcomeHistory {
    pub last_sync: Option<DateTime<Utc>>,
    pub last_sync_success: Option<bool>,
    pub last_sync_error: Option<String>,
    pub consecutive_failures: u32,
}

/// Result of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub pushed: u32,
    pub pulled: u32,
    pub conflicts: u32,
}

/// Remote repository credentials loaded from the credential store.
#[derive(Debug)]
pub struct SyncCredentials {
    pub token: SecretString,
    pub owner: String,
    pub repo: String,
}
