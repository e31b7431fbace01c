// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key-value store trait.

use async_trait::async_trait;

use crate::error::VaultlineError;

/// A named string-to-string store.
///
/// Stores are opened by a well-known name (see [`crate::keys`]) so that a
/// background execution context can find the same data the foreground wrote.
/// No lock is held across contexts, so multi-key updates go through
/// [`put_many`](KeyValueStore::put_many) and counters through
/// [`increment`](KeyValueStore::increment), both of which are atomic.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultlineError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), VaultlineError>;

    /// Removes `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), VaultlineError>;

    /// Writes every entry in one atomic batch.
    async fn put_many(&self, entries: &[(&str, String)]) -> Result<(), VaultlineError>;

    /// Atomically adds one to the integer stored at `key` (missing counts as 0)
    /// and returns the new value.
    async fn increment(&self, key: &str) -> Result<i64, VaultlineError>;

    /// Lists all keys in the store, sorted.
    async fn keys(&self) -> Result<Vec<String>, VaultlineError>;
}
