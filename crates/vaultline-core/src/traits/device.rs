// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Battery and network sensor traits.

use async_trait::async_trait;

use crate::error::VaultlineError;
use crate::types::{BatterySnapshot, ConnectionType};

/// Reads the device battery.
#[async_trait]
pub trait BatteryProbe: Send + Sync {
    async fn read(&self) -> Result<BatterySnapshot, VaultlineError>;
}

/// Lists the network transports that are currently up.
///
/// Synchronous because connectivity snapshots must be answerable without
/// suspending.
pub trait NetworkProbe: Send + Sync {
    fn transports(&self) -> Result<Vec<ConnectionType>, VaultlineError>;
}
