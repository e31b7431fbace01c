// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase-unlocked credential vault.
//!
//! The vault uses a key-wrapping pattern:
//! - A random master key seals every entry in `vault_entries`.
//! - The master key is sealed by an Argon2id key derived from the passphrase
//!   and kept in `vault_meta`, together with the salt and KDF parameters.
//!
//! One master key serves every named store in the database; the store name
//! only partitions the entries.

use async_trait::async_trait;
use ring::aead::NONCE_LEN;
use rusqlite::{OptionalExtension, params};
use secrecy::SecretString;
use tracing::{debug, info};
use vaultline_core::{KeyValueStore, VaultlineError};
use vaultline_storage::Database;
use zeroize::Zeroizing;

use crate::envelope::{self, KEY_LEN, KdfParams, SALT_LEN};

const WRAPPED_MASTER_KEY: &str = "wrapped_master_key";
const MASTER_KEY_NONCE: &str = "master_key_nonce";
const KDF_SALT: &str = "kdf_salt";
const KDF_PARAMS: &str = "kdf_params";

/// An unlocked, named credential store.
pub struct CredentialVault {
    master_key: Zeroizing<[u8; KEY_LEN]>,
    db: Database,
    store: String,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("store", &self.store)
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

struct VaultMeta {
    wrapped_master_key: Vec<u8>,
    nonce: Vec<u8>,
    salt: Vec<u8>,
    kdf_params: Vec<u8>,
}

impl CredentialVault {
    /// Whether a master key has been created in this database.
    pub async fn exists(db: &Database) -> Result<bool, VaultlineError> {
        db.connection()
            .call(|conn| -> Result<bool, rusqlite::Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM vault_meta WHERE key = ?1",
                    params![WRAPPED_MASTER_KEY],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Creates the master key, wraps it with `passphrase`, and opens `store`.
    pub async fn create(
        db: &Database,
        store: &str,
        passphrase: &SecretString,
        kdf: KdfParams,
    ) -> Result<Self, VaultlineError> {
        if Self::exists(db).await? {
            return Err(VaultlineError::Vault("vault already exists".to_string()));
        }

        let master_key = envelope::generate_key()?;
        let salt = envelope::generate_salt()?;
        let wrapping_key = kdf.derive(passphrase, &salt)?;
        let (wrapped, nonce) = envelope::seal(&wrapping_key, master_key.as_slice())?;
        let kdf_json = serde_json::to_vec(&kdf)
            .map_err(|e| VaultlineError::Vault(format!("cannot encode KDF params: {e}")))?;

        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                for (key, value) in [
                    (WRAPPED_MASTER_KEY, wrapped),
                    (MASTER_KEY_NONCE, nonce.to_vec()),
                    (KDF_SALT, salt.to_vec()),
                    (KDF_PARAMS, kdf_json),
                ] {
                    tx.execute(
                        "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)",
                        params![key, value],
                    )?;
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;

        info!(store, "credential vault created");
        Ok(Self {
            master_key,
            db: db.clone(),
            store: store.to_string(),
        })
    }

    /// Unwraps the master key with `passphrase` and opens `store`.
    pub async fn unlock(
        db: &Database,
        store: &str,
        passphrase: &SecretString,
    ) -> Result<Self, VaultlineError> {
        let meta = db
            .connection()
            .call(|conn| -> Result<Option<VaultMeta>, rusqlite::Error> {
                let read = |key: &str| -> Result<Option<Vec<u8>>, rusqlite::Error> {
                    conn.query_row(
                        "SELECT value FROM vault_meta WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()
                };
                let (Some(wrapped_master_key), Some(nonce), Some(salt), Some(kdf_params)) = (
                    read(WRAPPED_MASTER_KEY)?,
                    read(MASTER_KEY_NONCE)?,
                    read(KDF_SALT)?,
                    read(KDF_PARAMS)?,
                ) else {
                    return Ok(None);
                };
                Ok(Some(VaultMeta {
                    wrapped_master_key,
                    nonce,
                    salt,
                    kdf_params,
                }))
            })
            .await
            .map_err(map_tr_err)?
            .ok_or_else(|| VaultlineError::Vault("no vault has been created".to_string()))?;

        let kdf: KdfParams = serde_json::from_slice(&meta.kdf_params)
            .map_err(|e| VaultlineError::Vault(format!("corrupted KDF params: {e}")))?;
        let salt: [u8; SALT_LEN] = meta
            .salt
            .try_into()
            .map_err(|_| VaultlineError::Vault("corrupted salt".to_string()))?;
        let nonce: [u8; NONCE_LEN] = meta
            .nonce
            .try_into()
            .map_err(|_| VaultlineError::Vault("corrupted master key nonce".to_string()))?;

        let wrapping_key = kdf.derive(passphrase, &salt)?;
        let unwrapped = Zeroizing::new(
            envelope::open(&wrapping_key, &nonce, &meta.wrapped_master_key).map_err(|_| {
                VaultlineError::Vault("invalid passphrase or corrupted vault".to_string())
            })?,
        );
        let master_key: [u8; KEY_LEN] = unwrapped
            .as_slice()
            .try_into()
            .map_err(|_| VaultlineError::Vault("corrupted master key".to_string()))?;

        debug!(store, "credential vault unlocked");
        Ok(Self {
            master_key: Zeroizing::new(master_key),
            db: db.clone(),
            store: store.to_string(),
        })
    }

    /// Unlocks the vault, creating it first if this database has none.
    pub async fn open_or_create(
        db: &Database,
        store: &str,
        passphrase: &SecretString,
        kdf: KdfParams,
    ) -> Result<Self, VaultlineError> {
        if Self::exists(db).await? {
            Self::unlock(db, store, passphrase).await
        } else {
            Self::create(db, store, passphrase, kdf).await
        }
    }

    /// Opens another named store under the same master key.
    pub fn store(&self, name: &str) -> Self {
        Self {
            master_key: self.master_key.clone(),
            db: self.db.clone(),
            store: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.store
    }

    fn seal_value(&self, value: &str) -> Result<(Vec<u8>, Vec<u8>), VaultlineError> {
        let (ciphertext, nonce) = envelope::seal(&self.master_key, value.as_bytes())?;
        Ok((ciphertext, nonce.to_vec()))
    }
}

fn open_value(
    key: &[u8; KEY_LEN],
    ciphertext: &[u8],
    nonce: Vec<u8>,
) -> Result<String, VaultlineError> {
    let nonce: [u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| VaultlineError::Vault("corrupted nonce in vault entry".to_string()))?;
    let plaintext = envelope::open(key, &nonce, ciphertext)?;
    String::from_utf8(plaintext)
        .map_err(|e| VaultlineError::Vault(format!("decrypted value is not UTF-8: {e}")))
}

#[async_trait]
impl KeyValueStore for CredentialVault {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultlineError> {
        let store = self.store.clone();
        let name = key.to_string();
        let entry = self
            .db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT ciphertext, nonce FROM vault_entries WHERE store = ?1 AND name = ?2",
                    params![store, name],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;

        entry
            .map(|(ciphertext, nonce)| open_value(&self.master_key, &ciphertext, nonce))
            .transpose()
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), VaultlineError> {
        self.put_many(&[(key, value.to_string())]).await
    }

    async fn delete(&self, key: &str) -> Result<(), VaultlineError> {
        let store = self.store.clone();
        let name = key.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM vault_entries WHERE store = ?1 AND name = ?2",
                    params![store, name],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(store = %self.store, name = key, "vault entry deleted");
        Ok(())
    }

    async fn put_many(&self, entries: &[(&str, String)]) -> Result<(), VaultlineError> {
        let store = self.store.clone();
        let sealed = entries
            .iter()
            .map(|(name, value)| {
                let (ciphertext, nonce) = self.seal_value(value)?;
                Ok((name.to_string(), ciphertext, nonce))
            })
            .collect::<Result<Vec<_>, VaultlineError>>()?;

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO vault_entries (store, name, ciphertext, nonce)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT (store, name) DO UPDATE SET
                            ciphertext = excluded.ciphertext,
                            nonce = excluded.nonce,
                            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    )?;
                    for (name, ciphertext, nonce) in &sealed {
                        stmt.execute(params![store, name, ciphertext, nonce])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn increment(&self, key: &str) -> Result<i64, VaultlineError> {
        // Decrypt, add and re-seal inside one immediate transaction so that
        // a concurrent context cannot interleave.
        let store = self.store.clone();
        let name = key.to_string();
        let master_key = self.master_key.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<Result<i64, VaultlineError>, rusqlite::Error> {
                let tx =
                    conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
                let current = tx
                    .query_row(
                        "SELECT ciphertext, nonce FROM vault_entries WHERE store = ?1 AND name = ?2",
                        params![store, name],
                        |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
                    )
                    .optional()?;

                let current = match current {
                    Some((ciphertext, nonce)) => match open_value(&master_key, &ciphertext, nonce) {
                        Ok(text) => text.parse::<i64>().unwrap_or(0),
                        Err(e) => return Ok(Err(e)),
                    },
                    None => 0,
                };
                let next = current + 1;
                let (ciphertext, nonce) = match envelope::seal(&master_key, next.to_string().as_bytes()) {
                    Ok(sealed) => sealed,
                    Err(e) => return Ok(Err(e)),
                };
                tx.execute(
                    "INSERT INTO vault_entries (store, name, ciphertext, nonce)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (store, name) DO UPDATE SET
                        ciphertext = excluded.ciphertext,
                        nonce = excluded.nonce",
                    params![store, name, ciphertext, nonce.to_vec()],
                )?;
                tx.commit()?;
                Ok(Ok(next))
            })
            .await
            .map_err(map_tr_err)?
    }

    async fn keys(&self) -> Result<Vec<String>, VaultlineError> {
        let store = self.store.clone();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT name FROM vault_entries WHERE store = ?1 ORDER BY name")?;
                let rows = stmt.query_map(params![store], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VaultlineError {
    VaultlineError::Vault(format!("vault database error: {e}"))
}
