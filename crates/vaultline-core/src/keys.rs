// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Well-known store names and persisted keys.
//!
//! Background job executions re-open durable storage from scratch and find
//! their state by these names alone. Renaming any of them orphans data
//! written by earlier versions.

/// Store holding [`SyncSettings`](crate::SyncSettings) and
/// [`SyncOutcomeHistory`](crate::SyncOutcomeHistory).
pub const SYNC_STORE: &str = "vaultline_sync";

/// Encrypted store holding remote credentials and the root key.
pub const CREDENTIAL_STORE: &str = "vaultline_credentials";

/// Store holding local vault records that the sync component mirrors.
pub const RECORD_STORE: &str = "vaultline_records";

pub const ENABLED: &str = "enabled";
pub const INTERVAL: &str = "interval";
pub const REQUIRE_WIFI: &str = "require_wifi";
pub const REQUIRE_CHARGING: &str = "require_charging";
pub const LAST_SYNC: &str = "last_sync";
pub const LAST_SYNC_SUCCESS: &str = "last_sync_success";
pub const LAST_SYNC_ERROR: &str = "last_sync_error";
pub const CONSECUTIVE_FAILURES: &str = "consecutive_failures";

pub const GITHUB_TOKEN: &str = "github_token";
pub const GITHUB_OWNER: &str = "github_owner";
pub const GITHUB_REPO: &str = "github_repo";
pub const ROOT_KEY: &str = "root_key";
