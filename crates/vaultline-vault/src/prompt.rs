// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase acquisition via TTY prompt or the `VAULTLINE_VAULT_KEY` environment variable.

use std::io::IsTerminal;

use secrecy::SecretString;
use vaultline_core::VaultlineError;

/// Environment variable carrying the vault passphrase. Background job
/// executions inherit it from the daemon that launches them.
pub const VAULT_KEY_ENV_VAR: &str = "VAULTLINE_VAULT_KEY";

/// The passphrase from the environment only. Background executions use
/// this so they never block on a prompt.
pub fn passphrase_from_env() -> Option<SecretString> {
    std::env::var(VAULT_KEY_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn read_tty(prompt: &str) -> Result<String, VaultlineError> {
    eprint!("{prompt}");
    let passphrase = rpassword::read_password()
        .map_err(|e| VaultlineError::Vault(format!("failed to read passphrase: {e}")))?;
    if passphrase.is_empty() {
        return Err(VaultlineError::Vault("empty passphrase not allowed".to_string()));
    }
    Ok(passphrase)
}

fn no_source() -> VaultlineError {
    VaultlineError::Vault(format!(
        "no passphrase provided; set {VAULT_KEY_ENV_VAR} or run interactively"
    ))
}

/// Environment variable first, then an interactive prompt.
pub fn get_vault_passphrase() -> Result<SecretString, VaultlineError> {
    if let Some(key) = passphrase_from_env() {
        return Ok(key);
    }
    if std::io::stdin().is_terminal() {
        return read_tty("Vault passphrase: ").map(SecretString::from);
    }
    Err(no_source())
}

/// Like [`get_vault_passphrase`], but an interactive prompt asks twice.
pub fn get_vault_passphrase_with_confirm() -> Result<SecretString, VaultlineError> {
    if let Some(key) = passphrase_from_env() {
        return Ok(key);
    }
    if std::io::stdin().is_terminal() {
        let first = read_tty("New vault passphrase: ")?;
        let second = read_tty("Confirm vault passphrase: ")?;
        if first != second {
            return Err(VaultlineError::Vault("passphrases do not match".to_string()));
        }
        return Ok(SecretString::from(first));
    }
    Err(no_source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_var_wins() {
        // SAFETY: env mutation is serialized across this module.
        unsafe { std::env::set_var(VAULT_KEY_ENV_VAR, "from-env") };
        let result = get_vault_passphrase();
        unsafe { std::env::remove_var(VAULT_KEY_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "from-env");
    }

    #[test]
    #[serial]
    fn empty_env_var_is_ignored() {
        unsafe { std::env::set_var(VAULT_KEY_ENV_VAR, "") };
        // Test runners have no TTY on stdin, so no other source exists.
        let result = get_vault_passphrase_with_confirm();
        unsafe { std::env::remove_var(VAULT_KEY_ENV_VAR) };

        if !std::io::stdin().is_terminal() {
            assert!(result.is_err());
        }
    }
}
