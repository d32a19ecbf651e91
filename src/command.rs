// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands accepted by the device manager.
//!
//! Every command names its target device by alias. The [`Command`] enum is
//! the wire form used by the host: a JSON object tagged by `code`.
//!
//! # Examples
//!
//! ```
//! use dmx_executor::command::Command;
//!
//! let cmd: Command = serde_json::from_str(
//!     r#"{"code":"SetChannel","device_alias":"stage","channel":1,"value":200}"#,
//! ).unwrap();
//!
//! assert_eq!(cmd.code(), "SetChannel");
//! assert_eq!(cmd.device_alias(), "stage");
//! ```

use serde::{Deserialize, Serialize};

/// Sets one channel of the current scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetChannel {
    /// Target device.
    pub device_alias: String,
    /// Scene channel id.
    pub channel: u16,
    /// New value (0-255).
    pub value: i32,
}

impl SetChannel {
    /// Creates a set-channel command.
    #[must_use]
    pub fn new(device_alias: impl Into<String>, channel: u16, value: i32) -> Self {
        Self {
            device_alias: device_alias.into(),
            channel,
            value,
        }
    }

    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "SetChannel"
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        "Sets a channel of the current scene on a single DMX/Art-Net device"
    }
}

/// Adds a signed delta to one channel of the current scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementChannel {
    /// Target device.
    pub device_alias: String,
    /// Scene channel id.
    pub channel: u16,
    /// Delta applied to the current value.
    pub value: i32,
}

impl IncrementChannel {
    /// Creates an increment-channel command.
    #[must_use]
    pub fn new(device_alias: impl Into<String>, channel: u16, delta: i32) -> Self {
        Self {
            device_alias: device_alias.into(),
            channel,
            value: delta,
        }
    }

    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "IncrementChannel"
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        "Increments a channel of the current scene by a delta on a single DMX/Art-Net device"
    }
}

/// Zeroes every channel outside the device's non-blackout set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blackout {
    /// Target device.
    pub device_alias: String,
}

impl Blackout {
    /// Creates a blackout command.
    #[must_use]
    pub fn new(device_alias: impl Into<String>) -> Self {
        Self {
            device_alias: device_alias.into(),
        }
    }

    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "Blackout"
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        "Clears all channels of a single DMX/Art-Net device except the non-blackout ones"
    }
}

/// Selects a scene and applies its saved values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScene {
    /// Target device.
    pub device_alias: String,
    /// Scene to select.
    pub scene_alias: String,
}

impl SetScene {
    /// Creates a set-scene command.
    #[must_use]
    pub fn new(device_alias: impl Into<String>, scene_alias: impl Into<String>) -> Self {
        Self {
            device_alias: device_alias.into(),
            scene_alias: scene_alias.into(),
        }
    }

    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "SetScene"
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        "Sets a scene by alias on a single DMX/Art-Net device"
    }
}

/// Stores the universe values of the current scene's channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveScene {
    /// Target device.
    pub device_alias: String,
}

impl SaveScene {
    /// Creates a save-scene command.
    #[must_use]
    pub fn new(device_alias: impl Into<String>) -> Self {
        Self {
            device_alias: device_alias.into(),
        }
    }

    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "SaveScene"
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        "Saves the current scene of a single DMX/Art-Net device"
    }
}

/// Any command, tagged by its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum Command {
    /// See [`SetChannel`].
    SetChannel(SetChannel),
    /// See [`IncrementChannel`].
    IncrementChannel(IncrementChannel),
    /// See [`Blackout`].
    Blackout(Blackout),
    /// See [`SetScene`].
    SetScene(SetScene),
    /// See [`SaveScene`].
    SaveScene(SaveScene),
}

impl Command {
    /// Returns the alias of the target device.
    #[must_use]
    pub fn device_alias(&self) -> &str {
        match self {
            Self::SetChannel(c) => &c.device_alias,
            Self::IncrementChannel(c) => &c.device_alias,
            Self::Blackout(c) => &c.device_alias,
            Self::SetScene(c) => &c.device_alias,
            Self::SaveScene(c) => &c.device_alias,
        }
    }

    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SetChannel(c) => c.code(),
            Self::IncrementChannel(c) => c.code(),
            Self::Blackout(c) => c.code(),
            Self::SetScene(c) => c.code(),
            Self::SaveScene(c) => c.code(),
        }
    }

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::SetChannel(c) => c.description(),
            Self::IncrementChannel(c) => c.description(),
            Self::Blackout(c) => c.description(),
            Self::SetScene(c) => c.description(),
            Self::SaveScene(c) => c.description(),
        }
    }
}

impl From<SetChannel> for Command {
    fn from(cmd: SetChannel) -> Self {
        Self::SetChannel(cmd)
    }
}

impl From<IncrementChannel> for Command {
    fn from(cmd: IncrementChannel) -> Self {
        Self::IncrementChannel(cmd)
    }
}

impl From<Blackout> for Command {
    fn from(cmd: Blackout) -> Self {
        Self::Blackout(cmd)
    }
}

impl From<SetScene> for Command {
    fn from(cmd: SetScene) -> Self {
        Self::SetScene(cmd)
    }
}

impl From<SaveScene> for Command {
    fn from(cmd: SaveScene) -> Self {
        Self::SaveScene(cmd)
    }
}
