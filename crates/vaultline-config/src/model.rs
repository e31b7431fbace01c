// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed sections of `vaultline.toml`. Unknown keys are rejected so typos
//! surface at startup instead of silently falling back to defaults.

use serde::{Deserialize, Serialize};

/// Root of `vaultline.toml`; every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultlineConfig {
    #[serde(default)]
    pub app: AppConfig,

    /// Durable storage shared by the foreground process and background jobs.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Remote shell session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Background sync settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Battery and network sensor settings.
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Name shown in the persistent session notification.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// `vaultline=` filter level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_name() -> String {
    "Vaultline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where durable state lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite file opened independently by every process.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode so background jobs can read while the
    /// foreground process writes.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("vaultline").join("vaultline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vaultline.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

/// Credential vault key-derivation parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// KiB of memory per derivation.
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes.
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

/// Remote shell session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Upper bound on socket connect, handshake and channel open, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// TERM value requested for the pseudo-terminal.
    #[serde(default = "default_term")]
    pub term: String,

    #[serde(default = "default_cols")]
    pub cols: u16,

    #[serde(default = "default_rows")]
    pub rows: u16,

    /// Chunks buffered per output observer before slow observers start lagging.
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            term: default_term(),
            cols: default_cols(),
            rows: default_rows(),
            output_buffer: default_output_buffer(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_term() -> String {
    "xterm-256color".to_string()
}

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

fn default_output_buffer() -> usize {
    1024
}

/// Background sync configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Base URL of the GitHub-compatible contents API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory inside the remote repository that holds vault records.
    #[serde(default = "default_records_dir")]
    pub records_dir: String,

    /// How often the job daemon polls the durable job table, in seconds.
    #[serde(default = "default_job_poll_secs")]
    pub job_poll_secs: u64,

    /// A background job still running after this long is killed, in seconds.
    #[serde(default = "default_max_job_runtime_secs")]
    pub max_job_runtime_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            records_dir: default_records_dir(),
            job_poll_secs: default_job_poll_secs(),
            max_job_runtime_secs: default_max_job_runtime_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_records_dir() -> String {
    "vault".to_string()
}

fn default_job_poll_secs() -> u64 {
    30
}

fn default_max_job_runtime_secs() -> u64 {
    600
}

/// Battery and network sensor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Root of the sysfs tree the Linux sensors read from.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,

    /// How often connectivity is re-sampled, in seconds.
    #[serde(default = "default_connectivity_poll_secs")]
    pub connectivity_poll_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            connectivity_poll_secs: default_connectivity_poll_secs(),
        }
    }
}

fn default_sysfs_root() -> String {
    "/sys".to_string()
}

fn default_connectivity_poll_secs() -> u64 {
    5
}
