// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport-independent device settings and connection state.

use std::fmt;
use std::time::Duration;

use crate::config::DEFAULT_RECONNECT_INTERVAL;
use crate::types::{NonBlackoutChannels, Scene};

/// Upper bound for one health probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a device needs besides its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Unique device alias.
    pub alias: String,
    /// Configured scenes, in configuration order.
    pub scenes: Vec<Scene>,
    /// Universe channels left untouched by a blackout.
    pub non_blackout_channels: NonBlackoutChannels,
    /// Period of the reconnect loop.
    pub reconnect_interval: Duration,
    /// Upper bound for one health probe.
    pub probe_timeout: Duration,
}

impl DeviceSettings {
    /// Creates settings with no scenes and default timings.
    #[must_use]
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            scenes: Vec::new(),
            non_blackout_channels: NonBlackoutChannels::new(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the scenes.
    #[must_use]
    pub fn with_scenes(mut self, scenes: Vec<Scene>) -> Self {
        self.scenes = scenes;
        self
    }

    /// Sets the channels exempt from blackout.
    #[must_use]
    pub fn with_non_blackout_channels(mut self, channels: NonBlackoutChannels) -> Self {
        self.non_blackout_channels = channels;
        self
    }

    /// Sets the reconnect loop period.
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// Connection state of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No usable transport. Commands fail with `NoConnection`.
    #[default]
    Disconnected,
    /// The transport is open and the universe has been pushed.
    Connected,
}

impl ConnectionState {
    /// Returns `true` if connected.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connected => f.write_str("connected"),
        }
    }
}
