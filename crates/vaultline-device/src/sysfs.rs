// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Linux sensors backed by sysfs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::trace;
use vaultline_core::{
    BatteryProbe, BatterySnapshot, ChargingState, ConnectionType, NetworkProbe, VaultlineError,
};

fn io_err(path: &Path, e: std::io::Error) -> VaultlineError {
    VaultlineError::Internal(format!("cannot read {}: {e}", path.display()))
}

/// Reads `class/power_supply` under a sysfs root.
///
/// Machines without a battery but with mains power report a full battery,
/// so that desktops behave like a phone on its charger.
#[derive(Debug, Clone)]
pub struct SysfsBatteryProbe {
    root: PathBuf,
}

impl SysfsBatteryProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_attr(dir: &Path, name: &str) -> Option<String> {
        tokio::fs::read_to_string(dir.join(name))
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }

    async fn low_power(&self) -> bool {
        Self::read_attr(&self.root.join("firmware/acpi"), "platform_profile")
            .await
            .is_some_and(|profile| profile == "low-power")
    }
}

fn parse_status(status: &str) -> ChargingState {
    match status {
        "Charging" => ChargingState::Charging,
        "Full" => ChargingState::Full,
        "Discharging" => ChargingState::Discharging,
        "Not charging" => ChargingState::NotCharging,
        _ => ChargingState::Unknown,
    }
}

#[async_trait]
impl BatteryProbe for SysfsBatteryProbe {
    async fn read(&self) -> Result<BatterySnapshot, VaultlineError> {
        let supplies = self.root.join("class/power_supply");
        let mut entries = tokio::fs::read_dir(&supplies)
            .await
            .map_err(|e| io_err(&supplies, e))?;

        let mut mains_online = false;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err(&supplies, e))?
        {
            let dir = entry.path();
            match Self::read_attr(&dir, "type").await.as_deref() {
                Some("Battery") => {
                    let Some(level) = Self::read_attr(&dir, "capacity")
                        .await
                        .and_then(|c| c.parse::<u8>().ok())
                    else {
                        continue;
                    };
                    let state = Self::read_attr(&dir, "status")
                        .await
                        .map(|s| parse_status(&s))
                        .unwrap_or(ChargingState::Unknown);
                    let mut snapshot = BatterySnapshot::new(level, state);
                    snapshot.low_power = self.low_power().await;
                    trace!(supply = %dir.display(), level, %state, "battery sampled");
                    return Ok(snapshot);
                }
                Some("Mains") => {
                    mains_online |= Self::read_attr(&dir, "online").await.as_deref() == Some("1");
                }
                _ => {}
            }
        }

        if mains_online {
            return Ok(BatterySnapshot::new(100, ChargingState::Full));
        }
        Err(VaultlineError::Internal(format!(
            "no battery or mains supply under {}",
            supplies.display()
        )))
    }
}

/// Reads `class/net` under a sysfs root.
#[derive(Debug, Clone)]
pub struct SysfsNetworkProbe {
    root: PathBuf,
}

impl SysfsNetworkProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

const VPN_PREFIXES: &[&str] = &["tun", "tap", "wg", "ppp", "vpn", "utun"];
const CELLULAR_PREFIXES: &[&str] = &["wwan", "rmnet", "ccmni", "usb"];

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Transport behind one interface directory, or `None` for interfaces that
/// are down or do not reach off-host (loopback, bridges, container veths).
fn interface_transport(dir: &Path, name: &str) -> Option<ConnectionType> {
    if name == "lo" {
        return None;
    }

    let up = match read_attr(dir, "operstate").as_deref() {
        Some("up") => true,
        // Point-to-point tunnels usually report "unknown" while carrying traffic.
        Some("unknown") => read_attr(dir, "carrier").as_deref() == Some("1"),
        _ => false,
    };
    if !up {
        return None;
    }

    if dir.join("wireless").exists() || dir.join("phy80211").exists() {
        Some(ConnectionType::Wifi)
    } else if dir.join("tun_flags").exists() || VPN_PREFIXES.iter().any(|p| name.starts_with(p)) {
        Some(ConnectionType::Vpn)
    } else if CELLULAR_PREFIXES.iter().any(|p| name.starts_with(p)) {
        Some(ConnectionType::Cellular)
    } else if dir.join("device").exists() {
        Some(ConnectionType::Ethernet)
    } else {
        None
    }
}

impl NetworkProbe for SysfsNetworkProbe {
    fn transports(&self) -> Result<Vec<ConnectionType>, VaultlineError> {
        let net = self.root.join("class/net");
        let entries = std::fs::read_dir(&net).map_err(|e| io_err(&net, e))?;

        let mut transports: Vec<ConnectionType> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                interface_transport(&entry.path(), &name)
            })
            .collect();
        transports.sort();
        transports.dedup();
        Ok(transports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: PathBuf, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn reads_battery_capacity_and_status() {
        let root = tempfile::tempdir().unwrap();
        let bat = root.path().join("class/power_supply/BAT0");
        write(bat.join("type"), "Battery\n");
        write(bat.join("capacity"), "42\n");
        write(bat.join("status"), "Discharging\n");
        write(root.path().join("firmware/acpi/platform_profile"), "low-power\n");

        let snapshot = SysfsBatteryProbe::new(root.path()).read().await.unwrap();
        assert_eq!(snapshot.level, 42);
        assert_eq!(snapshot.state, ChargingState::Discharging);
        assert!(snapshot.low_power);
    }

    #[tokio::test]
    async fn mains_only_reports_full() {
        let root = tempfile::tempdir().unwrap();
        let ac = root.path().join("class/power_supply/AC");
        write(ac.join("type"), "Mains\n");
        write(ac.join("online"), "1\n");

        let snapshot = SysfsBatteryProbe::new(root.path()).read().await.unwrap();
        assert!(snapshot.is_charging());
        assert_eq!(snapshot.level, 100);
    }

    #[tokio::test]
    async fn missing_power_supply_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(SysfsBatteryProbe::new(root.path()).read().await.is_err());
    }

    #[test]
    fn classifies_interfaces() {
        let root = tempfile::tempdir().unwrap();
        let net = root.path().join("class/net");

        write(net.join("lo/operstate"), "unknown\n");
        write(net.join("lo/carrier"), "1\n");
        write(net.join("wlan0/operstate"), "up\n");
        fs::create_dir_all(net.join("wlan0/wireless")).unwrap();
        write(net.join("eth0/operstate"), "down\n");
        fs::create_dir_all(net.join("eth0/device")).unwrap();
        write(net.join("wg0/operstate"), "unknown\n");
        write(net.join("wg0/carrier"), "1\n");
        write(net.join("docker0/operstate"), "up\n");

        let transports = SysfsNetworkProbe::new(root.path()).transports().unwrap();
        assert_eq!(transports, vec![ConnectionType::Wifi, ConnectionType::Vpn]);
    }
}
