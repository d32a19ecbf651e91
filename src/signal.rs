// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Domain signals emitted by devices.
//!
//! Every device of a manager publishes into one shared [`SignalBus`]; the
//! manager hands out receivers and never consumes signals itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default capacity of the signal channel.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 256;

/// A scene event on one device.
///
/// # Examples
///
/// ```
/// use dmx_executor::signal::Signal;
///
/// let signal = Signal::scene_changed("stage", "day");
/// assert_eq!(signal.code(), "SceneChanged");
/// assert_eq!(signal.device_alias(), "stage");
/// assert_eq!(signal.scene_alias(), "day");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum Signal {
    /// A scene was selected and applied.
    SceneChanged {
        /// Alias of the device.
        device_alias: String,
        /// Alias of the selected scene.
        scene_alias: String,
        /// When the scene was applied.
        at: DateTime<Utc>,
    },

    /// The current scene's values were saved.
    SceneSaved {
        /// Alias of the device.
        device_alias: String,
        /// Alias of the saved scene.
        scene_alias: String,
        /// When the scene was saved.
        at: DateTime<Utc>,
    },
}

impl Signal {
    /// Creates a scene changed signal stamped with the current time.
    #[must_use]
    pub fn scene_changed(device_alias: impl Into<String>, scene_alias: impl Into<String>) -> Self {
        Self::SceneChanged {
            device_alias: device_alias.into(),
            scene_alias: scene_alias.into(),
            at: Utc::now(),
        }
    }

    /// Creates a scene saved signal stamped with the current time.
    #[must_use]
    pub fn scene_saved(device_alias: impl Into<String>, scene_alias: impl Into<String>) -> Self {
        Self::SceneSaved {
            device_alias: device_alias.into(),
            scene_alias: scene_alias.into(),
            at: Utc::now(),
        }
    }

    /// Returns the signal code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SceneChanged { .. } => "SceneChanged",
            Self::SceneSaved { .. } => "SceneSaved",
        }
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::SceneChanged { .. } => "Scene was successfully changed on a single DMX-compatible device",
            Self::SceneSaved { .. } => "Scene was successfully saved on a single DMX-compatible device",
        }
    }

    /// Returns the alias of the device that emitted the signal.
    #[must_use]
    pub fn device_alias(&self) -> &str {
        match self {
            Self::SceneChanged { device_alias, .. } | Self::SceneSaved { device_alias, .. } => {
                device_alias
            }
        }
    }

    /// Returns the scene alias.
    #[must_use]
    pub fn scene_alias(&self) -> &str {
        match self {
            Self::SceneChanged { scene_alias, .. } | Self::SceneSaved { scene_alias, .. } => {
                scene_alias
            }
        }
    }

    /// Returns the signal timestamp.
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::SceneChanged { at, .. } | Self::SceneSaved { at, .. } => *at,
        }
    }
}

/// Broadcast channel shared by every device of a manager.
///
/// Publishing never waits for subscribers. A subscriber that falls more than
/// the channel capacity behind loses the oldest signals and gets
/// `RecvError::Lagged` on its next receive.
#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
}

impl SignalBus {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SIGNAL_CAPACITY)
    }

    /// Creates a bus buffering at most `capacity` signals per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns a receiver for signals published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    /// Returns the number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes a signal. Dropped silently when nobody listens.
    pub fn publish(&self, signal: Signal) {
        let _ = self.sender.send(signal);
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
