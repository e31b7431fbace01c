// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity monitor.
//!
//! Classifies the strongest available transport (Wi-Fi > Ethernet > VPN >
//! Cellular) and publishes every change on a `watch` channel. Sensors that
//! cannot push are sampled by [`ConnectivityMonitor::spawn_polling`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultline_core::{ConnectionType, ConnectivityStatus, NetworkProbe};

/// Picks the strongest transport. An empty list is reported as offline and
/// metered, since an unknown link must be treated as costly.
pub fn classify(transports: &[ConnectionType]) -> ConnectivityStatus {
    const PRIORITY: [ConnectionType; 4] = [
        ConnectionType::Wifi,
        ConnectionType::Ethernet,
        ConnectionType::Vpn,
        ConnectionType::Cellular,
    ];

    PRIORITY
        .into_iter()
        .find(|candidate| transports.contains(candidate))
        .map(|connection_type| ConnectivityStatus {
            connected: true,
            connection_type,
            metered: connection_type == ConnectionType::Cellular,
        })
        .unwrap_or(ConnectivityStatus::OFFLINE)
}

pub struct ConnectivityMonitor {
    probe: Arc<dyn NetworkProbe>,
    status_tx: watch::Sender<ConnectivityStatus>,
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn NetworkProbe>) -> Self {
        let initial = sample(probe.as_ref());
        let (status_tx, _) = watch::channel(initial);
        Self { probe, status_tx }
    }

    /// Samples the sensor now, publishing the result if it changed.
    pub fn current_status(&self) -> ConnectivityStatus {
        let status = sample(self.probe.as_ref());
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            info!(
                connected = status.connected,
                connection_type = %status.connection_type,
                metered = status.metered,
                "connectivity changed"
            );
        }
        status
    }

    /// Last published status, without sampling.
    pub fn last_status(&self) -> ConnectivityStatus {
        *self.status_tx.borrow()
    }

    /// Stream of status transitions.
    pub fn changes(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status_tx.subscribe()
    }

    /// Resolves `true` as soon as a connected status is seen, or `false`
    /// once `timeout` elapses. The subscription is dropped on either path.
    pub async fn wait_for_connection(&self, timeout: Duration) -> bool {
        if self.current_status().connected {
            return true;
        }

        let mut rx = self.changes();
        let wait = async move {
            loop {
                if rx.borrow_and_update().connected {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Re-samples every `interval` until `cancel` fires.
    pub fn spawn_polling(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("connectivity polling stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.current_status();
                    }
                }
            }
        })
    }
}

fn sample(probe: &dyn NetworkProbe) -> ConnectivityStatus {
    match probe.transports() {
        Ok(transports) => classify(&transports),
        Err(e) => {
            warn!(error = %e, "network probe failed, assuming offline");
            ConnectivityStatus::OFFLINE
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("status", &self.last_status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticNetworkProbe;
    use vaultline_core::ConnectionType::{Cellular, Ethernet, Vpn, Wifi};

    #[test]
    fn classification_priority_and_metering() {
        assert_eq!(classify(&[Cellular, Wifi]).connection_type, Wifi);
        assert_eq!(classify(&[Cellular, Vpn]).connection_type, Vpn);
        assert_eq!(classify(&[Cellular, Ethernet, Vpn]).connection_type, Ethernet);

        let cell = classify(&[Cellular]);
        assert!(cell.connected && cell.metered);
        assert!(!classify(&[Vpn]).metered);

        let none = classify(&[]);
        assert!(!none.connected);
        assert!(none.metered);
        assert_eq!(none.connection_type, ConnectionType::None);
    }

    #[tokio::test]
    async fn changes_are_published_once() {
        let probe = Arc::new(StaticNetworkProbe::new(vec![]));
        let monitor = ConnectivityMonitor::new(probe.clone());
        let mut rx = monitor.changes();

        probe.set(vec![Wifi]);
        monitor.current_status();
        monitor.current_status();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().connection_type, Wifi);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_online() {
        let monitor = ConnectivityMonitor::new(Arc::new(StaticNetworkProbe::new(vec![Ethernet])));
        assert!(monitor.wait_for_connection(Duration::from_millis(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_and_releases_subscription() {
        let monitor = ConnectivityMonitor::new(Arc::new(StaticNetworkProbe::new(vec![])));
        assert!(!monitor.wait_for_connection(Duration::from_secs(5)).await);
        assert_eq!(monitor.status_tx.receiver_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_resolves_on_regain() {
        let probe = Arc::new(StaticNetworkProbe::new(vec![]));
        let monitor = Arc::new(ConnectivityMonitor::new(probe.clone()));

        let waiter = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.wait_for_connection(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        probe.set(vec![Cellular]);
        monitor.current_status();

        assert!(waiter.await.unwrap());
        assert_eq!(monitor.status_tx.receiver_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_picks_up_changes_until_cancelled() {
        let probe = Arc::new(StaticNetworkProbe::new(vec![]));
        let monitor = Arc::new(ConnectivityMonitor::new(probe.clone()));
        let cancel = CancellationToken::new();
        let handle = monitor.spawn_polling(Duration::from_secs(5), cancel.clone());

        probe.set(vec![Wifi]);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(monitor.last_status().connected);

        cancel.cancel();
        handle.await.unwrap();
    }
}
