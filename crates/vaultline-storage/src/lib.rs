// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Vaultline runtime.
//!
//! Every execution context (the foreground process and each background job)
//! opens its own [`Database`] on the same file. WAL mode and a busy timeout
//! let them coexist; nothing is shared in memory.

pub mod database;
pub mod jobs;
pub mod kv;
pub mod memory;
pub mod migrations;

pub use database::{Database, map_tr_err};
pub use jobs::{JobKind, ScheduledJob};
pub use kv::SqliteKeyValueStore;
pub use memory::MemoryKeyValueStore;
