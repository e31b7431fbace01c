// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential storage for Vaultline.
//!
//! [`CredentialVault`] is a named [`KeyValueStore`](vaultline_core::KeyValueStore)
//! whose values are sealed with AES-256-GCM. The master key is wrapped by an
//! Argon2id key derived from the user's passphrase, so a background job can
//! reopen the same store given only the database path and the passphrase.
//!
//! [`RootKey`] is the separate key that seals vault records before they leave
//! the device.

pub mod envelope;
pub mod prompt;
pub mod vault;

pub use envelope::{KdfParams, RootKey};
pub use prompt::{
    VAULT_KEY_ENV_VAR, get_vault_passphrase, get_vault_passphrase_with_confirm,
    passphrase_from_env,
};
pub use vault::CredentialVault;
