// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Range checks that serde cannot express: non-empty paths, positive
//! intervals, Argon2id floors, pty geometry and a parseable API URL.

use crate::diagnostic::ConfigError;
use crate::model::VaultlineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// 32 MiB.
const MIN_KDF_MEMORY_KIB: u32 = 32768;

/// Returns every violation at once so one edit fixes the whole file.
pub fn validate_config(config: &VaultlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.app.log_level.as_str()) {
        fail(format!(
            "app.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.app.log_level
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let vault = &config.vault;
    for (key, value, minimum) in [
        ("kdf_memory_cost", vault.kdf_memory_cost, MIN_KDF_MEMORY_KIB),
        ("kdf_iterations", vault.kdf_iterations, 2),
        ("kdf_parallelism", vault.kdf_parallelism, 1),
    ] {
        if value < minimum {
            fail(format!("vault.{key} is {value}, below the minimum of {minimum}"));
        }
    }

    if config.session.connect_timeout_secs == 0 {
        fail("session.connect_timeout_secs must be positive".to_string());
    }

    if config.session.cols == 0 || config.session.rows == 0 {
        fail(format!(
            "session pty size must be non-zero, got {}x{}",
            config.session.cols, config.session.rows
        ));
    }

    if config.session.output_buffer == 0 {
        fail("session.output_buffer must be positive".to_string());
    }

    if reqwest::Url::parse(&config.sync.api_base_url).is_err() {
        fail(format!(
            "sync.api_base_url `{}` is not a valid URL",
            config.sync.api_base_url
        ));
    }

    if config.sync.records_dir.trim_matches('/').is_empty() {
        fail("sync.records_dir must name a directory".to_string());
    }

    if config.sync.job_poll_secs == 0 {
        fail("sync.job_poll_secs must be positive".to_string());
    }

    if config.device.connectivity_poll_secs == 0 {
        fail("device.connectivity_poll_secs must be positive".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&VaultlineConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = VaultlineConfig::default();
        config.storage.database_path = "  ".into();
        config.session.connect_timeout_secs = 0;
        config.sync.api_base_url = "not a url".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn weak_kdf_is_rejected() {
        let mut config = VaultlineConfig::default();
        config.vault.kdf_memory_cost = 1024;
        config.vault.kdf_iterations = 1;
        let messages: Vec<String> = validate_config(&config)
            .unwrap_err()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("vault.kdf_memory_cost is 1024"));
        assert!(messages[1].contains("vault.kdf_iterations"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = VaultlineConfig::default();
        config.app.log_level = "verbose".into();
        let rejected = validate_config(&config).unwrap_err();
        assert!(rejected[0].to_string().contains("app.log_level"));
    }
}
