// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device state for the Vaultline runtime.
//!
//! The battery policy is a pure function of one sensor reading; the
//! connectivity monitor classifies the strongest available transport and
//! publishes transitions on a watch channel. Sensors are pluggable through
//! [`BatteryProbe`](vaultline_core::BatteryProbe) and
//! [`NetworkProbe`](vaultline_core::NetworkProbe).

pub mod battery;
pub mod connectivity;
pub mod probe;
pub mod sysfs;

pub use battery::{BatteryMonitor, evaluate, optimization_status};
pub use connectivity::{ConnectivityMonitor, classify};
pub use probe::{StaticBatteryProbe, StaticNetworkProbe};
pub use sysfs::{SysfsBatteryProbe, SysfsNetworkProbe};
