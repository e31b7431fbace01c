// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultline credentials` and `vaultline records` subcommands.
//!
//! Both work on the encrypted vault; the first run creates it and asks for a
//! new passphrase.

use std::io::BufRead;

use clap::{Subcommand, ValueEnum};
use secrecy::ExposeSecret;
use tracing::info;

use vaultline_config::VaultlineConfig;
use vaultline_core::{KeyValueStore, VaultlineError, keys};
use vaultline_storage::Database;
use vaultline_vault::{CredentialVault, KdfParams, RootKey};

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Store one remote credential. Prompts when no value is given.
    Set {
        name: CredentialName,
        value: Option<String>,
    },
    /// Generate the root key that seals mirrored records.
    InitRootKey {
        /// Replace an existing key. Records sealed with it become unreadable.
        #[arg(long)]
        force: bool,
    },
    /// Import a root key generated on another device (prompts for the hex).
    ImportRootKey,
    /// Show which credentials are configured, without their values.
    List,
}

#[derive(Subcommand, Debug)]
pub enum RecordsCommand {
    /// Add or replace a record.
    Set { name: String, value: String },
    /// Print one record.
    Get { name: String },
    /// List record names.
    List,
    /// Remove a record.
    Delete { name: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialName {
    Token,
    Owner,
    Repo,
}

impl CredentialName {
    fn key(self) -> &'static str {
        match self {
            Self::Token => keys::GITHUB_TOKEN,
            Self::Owner => keys::GITHUB_OWNER,
            Self::Repo => keys::GITHUB_REPO,
        }
    }
}

async fn open_vault(config: &VaultlineConfig) -> Result<CredentialVault, VaultlineError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let passphrase = if CredentialVault::exists(&db).await? {
        vaultline_vault::get_vault_passphrase()?
    } else {
        eprintln!("No vault found, creating one.");
        vaultline_vault::get_vault_passphrase_with_confirm()?
    };
    CredentialVault::open_or_create(
        &db,
        keys::CREDENTIAL_STORE,
        &passphrase,
        KdfParams::from(&config.vault),
    )
    .await
}

pub async fn run_credentials(
    config: &VaultlineConfig,
    command: CredentialsCommand,
) -> Result<(), VaultlineError> {
    let vault = open_vault(config).await?;
    match command {
        CredentialsCommand::Set { name, value } => {
            let value = match value {
                Some(value) => value,
                None => prompt_value(name)?,
            };
            set_credential(&vault, name, &value).await?;
            println!("{} saved", name.key());
        }
        CredentialsCommand::InitRootKey { force } => {
            init_root_key(&vault, force).await?;
            println!("root key generated; import it on other devices with `credentials import-root-key`");
        }
        CredentialsCommand::ImportRootKey => {
            let hex = rpassword::prompt_password("Root key (hex): ")
                .map_err(|e| VaultlineError::Internal(format!("cannot read root key: {e}")))?;
            import_root_key(&vault, hex.trim()).await?;
            println!("root key imported");
        }
        CredentialsCommand::List => {
            for (key, configured) in configured(&vault).await? {
                let mark = if configured { "set" } else { "missing" };
                println!("{key:<14} {mark}");
            }
        }
    }
    Ok(())
}

pub async fn run_records(
    config: &VaultlineConfig,
    command: RecordsCommand,
) -> Result<(), VaultlineError> {
    let records = open_vault(config).await?.store(keys::RECORD_STORE);
    match command {
        RecordsCommand::Set { name, value } => {
            records.put(&name, &value).await?;
            info!(record = %name, "record saved");
        }
        RecordsCommand::Get { name } => match records.get(&name).await? {
            Some(value) => println!("{value}"),
            None => return Err(VaultlineError::Vault(format!("no record named {name}"))),
        },
        RecordsCommand::List => {
            for name in records.keys().await? {
                println!("{name}");
            }
        }
        RecordsCommand::Delete { name } => {
            records.delete(&name).await?;
            info!(record = %name, "record deleted");
        }
    }
    Ok(())
}

fn prompt_value(name: CredentialName) -> Result<String, VaultlineError> {
    let read_err = |e: std::io::Error| VaultlineError::Internal(format!("cannot read input: {e}"));
    let value = match name {
        CredentialName::Token => rpassword::prompt_password("GitHub token: ").map_err(read_err)?,
        CredentialName::Owner | CredentialName::Repo => {
            eprint!("{}: ", name.key());
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map_err(read_err)?;
            line
        }
    };
    Ok(value.trim().to_string())
}

async fn set_credential(
    store: &dyn KeyValueStore,
    name: CredentialName,
    value: &str,
) -> Result<(), VaultlineError> {
    if value.is_empty() {
        return Err(VaultlineError::Config(format!("{} must not be empty", name.key())));
    }
    store.put(name.key(), value).await
}

async fn init_root_key(store: &dyn KeyValueStore, force: bool) -> Result<(), VaultlineError> {
    let existing = store.get(keys::ROOT_KEY).await?.filter(|k| !k.is_empty());
    if existing.is_some() && !force {
        return Err(VaultlineError::Vault(
            "root key already set; pass --force to replace it".to_string(),
        ));
    }
    let key = RootKey::generate()?;
    store.put(keys::ROOT_KEY, key.to_hex().expose_secret()).await?;
    info!(replaced = existing.is_some(), "root key generated");
    Ok(())
}

async fn import_root_key(store: &dyn KeyValueStore, hex: &str) -> Result<(), VaultlineError> {
    let key = RootKey::from_hex(&hex.to_string().into())?;
    store.put(keys::ROOT_KEY, key.to_hex().expose_secret()).await
}

async fn configured(store: &dyn KeyValueStore) -> Result<Vec<(&'static str, bool)>, VaultlineError> {
    let mut entries = Vec::new();
    for key in [keys::GITHUB_TOKEN, keys::GITHUB_OWNER, keys::GITHUB_REPO, keys::ROOT_KEY] {
        let present = store.get(key).await?.is_some_and(|v| !v.is_empty());
        entries.push((key, present));
    }
    Ok(entries)
}
