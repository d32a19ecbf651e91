// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background reconnect and health-check loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::ConnectionState;
use super::state::DeviceCore;
use crate::error::TransportError;
use crate::transport::Transport;

/// Runs until `cancel` fires.
///
/// Every tick either connects a disconnected device (and re-pushes its
/// universe) or probes a connected one. A step in flight is dropped as soon
/// as `cancel` fires, releasing the device lock.
pub(super) async fn run<T: Transport>(
    alias: String,
    core: Arc<Mutex<DeviceCore<T>>>,
    interval: Duration,
    probe_timeout: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(device = %alias, interval_ms = interval.as_millis(), "Reconnect loop started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = step(&core, probe_timeout) => {}
        }
    }

    tracing::debug!(device = %alias, "Reconnect loop stopped");
}

async fn step<T: Transport>(core: &Mutex<DeviceCore<T>>, probe_timeout: Duration) {
    let mut core = core.lock().await;

    match core.state {
        ConnectionState::Disconnected => {
            let attempt = tokio::time::timeout(probe_timeout, core.connect())
                .await
                .unwrap_or_else(|_| Err(TransportError::Timeout(millis(probe_timeout))));

            match attempt {
                Ok(()) => tracing::info!(
                    device = %core.alias,
                    transport = %core.transport.describe(),
                    "Device connected"
                ),
                Err(e) => {
                    core.transport.close();
                    tracing::debug!(device = %core.alias, error = %e, "Connection attempt failed");
                }
            }
        }
        ConnectionState::Connected => {
            let alive = tokio::time::timeout(probe_timeout, core.transport.probe())
                .await
                .unwrap_or(false);

            if alive {
                tracing::trace!(device = %core.alias, "Health check passed");
            } else {
                core.disconnect();
                tracing::info!(device = %core.alias, "Health check failed, device disconnected");
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
