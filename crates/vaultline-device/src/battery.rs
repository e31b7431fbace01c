// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Battery policy engine.
//!
//! Rules, first match wins:
//!
//! | Condition                   | Sync    | Keep-alive | Interval     |
//! |-----------------------------|---------|------------|--------------|
//! | charging or full            | yes     | 15 s       | 15 min       |
//! | level < 10                  | no      | off        | 4 x default  |
//! | level <= 20                 | yes     | off        | 4 x default  |
//! | level <= 50                 | yes     | 60 s       | 2 x default  |
//! | otherwise                   | yes     | 30 s       | default      |

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use vaultline_core::types::{DEFAULT_SYNC_INTERVAL_MINUTES, MIN_SYNC_INTERVAL_MINUTES};
use vaultline_core::{BatteryOptimizationStatus, BatteryPolicy, BatteryProbe, BatterySnapshot};

pub const CRITICAL_LEVEL: u8 = 10;
pub const LOW_LEVEL: u8 = 20;
pub const MEDIUM_LEVEL: u8 = 50;

const CHARGING_KEEP_ALIVE: Duration = Duration::from_secs(15);
const MEDIUM_KEEP_ALIVE: Duration = Duration::from_secs(60);
const HIGH_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Derives the policy for one battery reading.
pub fn evaluate(snapshot: &BatterySnapshot) -> BatteryPolicy {
    if snapshot.is_charging() {
        return BatteryPolicy {
            sync_permitted: true,
            keep_alive: Some(CHARGING_KEEP_ALIVE),
            recommended_interval_minutes: MIN_SYNC_INTERVAL_MINUTES,
        };
    }

    match snapshot.level {
        level if level < CRITICAL_LEVEL => BatteryPolicy {
            sync_permitted: false,
            keep_alive: None,
            recommended_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES * 4,
        },
        level if level <= LOW_LEVEL => BatteryPolicy {
            sync_permitted: true,
            keep_alive: None,
            recommended_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES * 4,
        },
        level if level <= MEDIUM_LEVEL => BatteryPolicy {
            sync_permitted: true,
            keep_alive: Some(MEDIUM_KEEP_ALIVE),
            recommended_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES * 2,
        },
        _ => BatteryPolicy {
            sync_permitted: true,
            keep_alive: Some(HIGH_KEEP_ALIVE),
            recommended_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
        },
    }
}

/// Status surfaced to settings screens.
pub fn optimization_status(snapshot: &BatterySnapshot) -> BatteryOptimizationStatus {
    let charging = snapshot.is_charging();
    BatteryOptimizationStatus {
        level: snapshot.level,
        charging,
        low_power: snapshot.low_power,
        should_optimize: !charging && (snapshot.level <= MEDIUM_LEVEL || snapshot.low_power),
        recommended_interval_minutes: evaluate(snapshot).recommended_interval_minutes,
    }
}

/// Reads the battery sensor and applies [`evaluate`].
///
/// A failed sensor read never fails the caller: it is logged and treated as
/// [`BatterySnapshot::UNKNOWN`].
#[derive(Clone)]
pub struct BatteryMonitor {
    probe: Arc<dyn BatteryProbe>,
}

impl BatteryMonitor {
    pub fn new(probe: Arc<dyn BatteryProbe>) -> Self {
        Self { probe }
    }

    pub async fn snapshot(&self) -> BatterySnapshot {
        match self.probe.read().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "battery read failed, assuming unknown state");
                BatterySnapshot::UNKNOWN
            }
        }
    }

    pub async fn policy(&self) -> BatteryPolicy {
        evaluate(&self.snapshot().await)
    }

    pub async fn should_perform_sync(&self) -> bool {
        self.policy().await.sync_permitted
    }

    pub async fn should_enable_keep_alive(&self) -> bool {
        self.policy().await.keep_alive.is_some()
    }

    /// Keep-alive cadence, or `None` when keep-alive should be off.
    pub async fn keep_alive_interval(&self) -> Option<Duration> {
        self.policy().await.keep_alive
    }

    pub async fn recommended_sync_interval(&self) -> u32 {
        self.policy().await.recommended_interval_minutes
    }

    pub async fn optimization_status(&self) -> BatteryOptimizationStatus {
        optimization_status(&self.snapshot().await)
    }
}

impl std::fmt::Debug for BatteryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatteryMonitor").finish_non_exhaustive()
    }
}
