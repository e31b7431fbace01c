// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM sealing, Argon2id key derivation, and the root key.
//!
//! Every seal draws a fresh 96-bit nonce from the system CSPRNG.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use vaultline_core::VaultlineError;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, VaultlineError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| VaultlineError::Vault("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn random_bytes<const N: usize>(what: &str) -> Result<[u8; N], VaultlineError> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| VaultlineError::Vault(format!("failed to generate random {what}")))?;
    Ok(out)
}

/// Encrypts `plaintext`, returning `(ciphertext_with_tag, nonce)`.
pub fn seal(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), VaultlineError> {
    let nonce_bytes = random_bytes::<NONCE_LEN>("nonce")?;
    let mut in_out = plaintext.to_vec();
    aead_key(key)?
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| VaultlineError::Vault("AES-256-GCM encryption failed".to_string()))?;
    Ok((in_out, nonce_bytes))
}

/// Decrypts output of [`seal`]. Fails on a wrong key or tampered data.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, VaultlineError> {
    let mut in_out = ciphertext.to_vec();
    let plaintext = aead_key(key)?
        .open_in_place(Nonce::assume_unique_for_key(*nonce), Aad::empty(), &mut in_out)
        .map_err(|_| {
            VaultlineError::Vault("decryption failed: wrong key or corrupted data".to_string())
        })?;
    Ok(plaintext.to_vec())
}

/// Argon2id parameters, persisted next to the wrapped master key so a vault
/// unlocks with the parameters it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<&vaultline_config::model::VaultConfig> for KdfParams {
    fn from(config: &vaultline_config::model::VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }
}

impl KdfParams {
    pub fn derive(
        &self,
        passphrase: &SecretString,
        salt: &[u8; SALT_LEN],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultlineError> {
        let params = argon2::Params::new(
            self.memory_cost,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultlineError::Vault(format!("invalid Argon2id parameters: {e}")))?;
        let argon2 =
            argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.expose_secret().as_bytes(), salt, output.as_mut())
            .map_err(|e| VaultlineError::Vault(format!("Argon2id key derivation failed: {e}")))?;
        Ok(output)
    }
}

pub fn generate_salt() -> Result<[u8; SALT_LEN], VaultlineError> {
    random_bytes::<SALT_LEN>("salt")
}

pub fn generate_key() -> Result<Zeroizing<[u8; KEY_LEN]>, VaultlineError> {
    Ok(Zeroizing::new(random_bytes::<KEY_LEN>("key")?))
}

/// The key that seals vault records before they are uploaded.
///
/// Stored hex-encoded in the credential store under
/// [`ROOT_KEY`](vaultline_core::keys::ROOT_KEY).
pub struct RootKey(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for RootKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RootKey([REDACTED])")
    }
}

impl RootKey {
    pub fn generate() -> Result<Self, VaultlineError> {
        Ok(Self(generate_key()?))
    }

    pub fn from_hex(encoded: &SecretString) -> Result<Self, VaultlineError> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.expose_secret().trim())
                .map_err(|e| VaultlineError::Vault(format!("root key is not valid hex: {e}")))?,
        );
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            VaultlineError::Vault(format!(
                "root key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(key)))
    }

    pub fn to_hex(&self) -> SecretString {
        SecretString::from(hex::encode(self.0.as_slice()))
    }

    /// Seals `plaintext` into a self-contained `nonce || ciphertext` blob.
    pub fn seal_blob(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultlineError> {
        let (ciphertext, nonce) = seal(&self.0, plaintext)?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn open_blob(&self, blob: &[u8]) -> Result<Vec<u8>, VaultlineError> {
        if blob.len() < NONCE_LEN {
            return Err(VaultlineError::Vault(
                "sealed blob is shorter than its nonce".to_string(),
            ));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| VaultlineError::Internal("nonce split mismatch".to_string()))?;
        open(&self.0, &nonce, ciphertext)
    }
}
