// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./vaultline.toml` > `~/.config/vaultline/vaultline.toml`
//! > `/etc/vaultline/vaultline.toml`, with environment variable overrides via the
//! `VAULTLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::VaultlineConfig;

const SYSTEM_CONFIG: &str = "/etc/vaultline/vaultline.toml";
const LOCAL_CONFIG: &str = "vaultline.toml";

/// Config files consulted, lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("vaultline").join(LOCAL_CONFIG));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/vaultline/vaultline.toml`
/// 3. `~/.config/vaultline/vaultline.toml`
/// 4. `./vaultline.toml`
/// 5. `VAULTLINE_*` environment variables
pub fn load_config() -> Result<VaultlineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<VaultlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VaultlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VaultlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VaultlineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    search_paths().into_iter().fold(
        Figment::new().merge(Serialized::defaults(VaultlineConfig::default())),
        |figment, path| figment.merge(Toml::file(path)),
    )
    .merge(env_provider())
}

/// Maps `VAULTLINE_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `VAULTLINE_SESSION_CONNECT_TIMEOUT_SECS` is
/// `session.connect_timeout_secs`, not `session.connect.timeout.secs`.
/// `VAULTLINE_VAULT_KEY` is the vault passphrase, not a config key, and is
/// ignored here.
fn env_provider() -> Env {
    Env::prefixed("VAULTLINE_")
        .ignore(&["vault_key"])
        .map(|key| {
            let key_str = key.as_str();
            let mapped = ["app", "storage", "vault", "session", "sync", "device"]
                .iter()
                .find_map(|section| {
                    key_str
                        .strip_prefix(section)
                        .and_then(|rest| rest.strip_prefix('_'))
                        .map(|rest| format!("{section}.{rest}"))
                })
                .unwrap_or_else(|| key_str.to_string());
            mapped.into()
        })
}
