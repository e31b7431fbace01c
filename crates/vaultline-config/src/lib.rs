// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Vaultline runtime.
//!
//! Every section rejects unknown keys. Files are layered from `/etc` down to
//! the working directory, and `VAULTLINE_*` variables override them. Load
//! failures come back as miette diagnostics.
//!
//! # Usage
//!
//! ```no_run
//! use vaultline_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, TomlSources, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::VaultlineConfig;

/// Loads from the XDG hierarchy plus `VAULTLINE_*` env and validates.
pub fn load_and_validate() -> Result<VaultlineConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        TomlSources::read(loader::search_paths())
    })
}

/// Loads a single TOML document (no files, no env) and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<VaultlineConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        TomlSources::inline(toml_content)
    })
}

/// Loads an explicit file plus env overrides and validates.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<VaultlineConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || TomlSources::read([path]))
}

// Sources are only read back when there is an error to point into.
fn finish(
    loaded: Result<VaultlineConfig, figment::Error>,
    sources: impl FnOnce() -> TomlSources,
) -> Result<VaultlineConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::diagnose(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}
