// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Vaultline integration tests.
//!
//! Everything here runs in memory: no sockets, no sysfs, no platform
//! services. Harnesses wire the mocks into the real session registry and
//! sync scheduler.
//!
//! # Components
//!
//! - [`MockShellConnector`] - shell transport with scriptable failures and output
//! - [`RecordingNotifier`], [`RecordingWakeLock`], [`MockJobScheduler`] - platform doubles
//! - [`ScriptedSyncEngineFactory`], [`MemoryObjectStore`] - sync doubles
//! - [`SessionHarness`], [`SyncHarness`] - assembled stacks

pub mod harness;
pub mod mock_platform;
pub mod mock_shell;
pub mod mock_sync;

pub use harness::{SessionHarness, SyncHarness, key_credential, password_credential};
pub use mock_platform::{MockJobScheduler, RecordingNotifier, RecordingWakeLock, SchedulerCall};
pub use mock_shell::{MockShellChannel, MockShellConnector};
pub use mock_sync::{MemoryObjectStore, ScriptedSyncEngineFactory};
