// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the runtime is written against.
//!
//! Every trait uses `#[async_trait]` where I/O is involved so that
//! implementations can be held as `Arc<dyn Trait>` by the composition root.

pub mod device;
pub mod platform;
pub mod shell;
pub mod store;
pub mod sync;

pub use device::{BatteryProbe, NetworkProbe};
pub use platform::{JobCompletion, JobScheduler, PresenceNotifier, WakeLock};
pub use shell::{ChannelOutput, OpenedShell, ShellChannel, ShellConnector, ShellTransport};
pub use store::KeyValueStore;
pub use sync::{RemoteObjectStore, SyncEngine, SyncEngineFactory};
