// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sensors whose readings are set by the caller.
//!
//! Used where no hardware sensor exists, such as headless servers and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use vaultline_core::{BatteryProbe, BatterySnapshot, ConnectionType, NetworkProbe, VaultlineError};

#[derive(Debug)]
pub struct StaticBatteryProbe {
    reading: Mutex<Result<BatterySnapshot, String>>,
}

impl StaticBatteryProbe {
    pub fn new(snapshot: BatterySnapshot) -> Self {
        Self {
            reading: Mutex::new(Ok(snapshot)),
        }
    }

    pub fn set(&self, snapshot: BatterySnapshot) {
        if let Ok(mut reading) = self.reading.lock() {
            *reading = Ok(snapshot);
        }
    }

    /// Makes subsequent reads fail with `message`.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut reading) = self.reading.lock() {
            *reading = Err(message.to_string());
        }
    }
}

#[async_trait]
impl BatteryProbe for StaticBatteryProbe {
    async fn read(&self) -> Result<BatterySnapshot, VaultlineError> {
        let reading = self
            .reading
            .lock()
            .map_err(|_| VaultlineError::Internal("battery probe lock poisoned".to_string()))?;
        reading.clone().map_err(VaultlineError::Internal)
    }
}

#[derive(Debug, Default)]
pub struct StaticNetworkProbe {
    transports: Mutex<Vec<ConnectionType>>,
}

impl StaticNetworkProbe {
    pub fn new(transports: Vec<ConnectionType>) -> Self {
        Self {
            transports: Mutex::new(transports),
        }
    }

    pub fn set(&self, transports: Vec<ConnectionType>) {
        if let Ok(mut current) = self.transports.lock() {
            *current = transports;
        }
    }
}

impl NetworkProbe for StaticNetworkProbe {
    fn transports(&self) -> Result<Vec<ConnectionType>, VaultlineError> {
        self.transports
            .lock()
            .map(|t| t.clone())
            .map_err(|_| VaultlineError::Internal("network probe lock poisoned".to_string()))
    }
}
