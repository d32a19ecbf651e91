// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry entry wrapping either device kind.

use std::fmt;

use crate::device::{ConnectionState, Device};
use crate::error::DeviceError;
use crate::transport::TransportFactory;
use crate::types::{Scene, Universe};

/// A device owned by the manager.
///
/// Both variants expose the same operations; they differ only in transport.
pub enum ManagedDevice<F: TransportFactory> {
    /// Serial DMX device.
    Dmx(Device<F::Dmx>),
    /// Art-Net device.
    ArtNet(Device<F::ArtNet>),
}

macro_rules! dispatch {
    ($self:ident, $device:ident => $body:expr) => {
        match $self {
            Self::Dmx($device) => $body,
            Self::ArtNet($device) => $body,
        }
    };
}

impl<F: TransportFactory> ManagedDevice<F> {
    /// Returns the device alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        dispatch!(self, d => d.alias())
    }

    /// Returns the device kind, `"dmx"` or `"artnet"`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Dmx(_) => "dmx",
            Self::ArtNet(_) => "artnet",
        }
    }

    /// Returns the connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        dispatch!(self, d => d.connection_state().await)
    }

    /// Returns `true` if the device is connected.
    pub async fn is_connected(&self) -> bool {
        dispatch!(self, d => d.is_connected().await)
    }

    /// Returns a snapshot of the universe.
    pub async fn universe(&self) -> Universe {
        dispatch!(self, d => d.universe().await)
    }

    /// Returns the alias of the current scene.
    pub async fn current_scene(&self) -> Option<String> {
        dispatch!(self, d => d.current_scene().await)
    }

    /// Returns a snapshot of a scene.
    pub async fn scene(&self, scene_alias: &str) -> Option<Scene> {
        dispatch!(self, d => d.scene(scene_alias).await)
    }

    pub(crate) async fn set_channel(&self, channel: u16, value: i32) -> Result<(), DeviceError> {
        dispatch!(self, d => d.set_channel(channel, value).await)
    }

    pub(crate) async fn increment_channel(&self, channel: u16, delta: i32) -> Result<(), DeviceError> {
        dispatch!(self, d => d.increment_channel(channel, delta).await)
    }

    pub(crate) async fn blackout(&self) -> Result<(), DeviceError> {
        dispatch!(self, d => d.blackout().await)
    }

    pub(crate) async fn set_scene(&self, scene_alias: &str) -> Result<(), DeviceError> {
        dispatch!(self, d => d.set_scene(scene_alias).await)
    }

    pub(crate) async fn save_scene(&self) -> Result<(), DeviceError> {
        dispatch!(self, d => d.save_scene().await)
    }

    pub(crate) async fn close(&self) {
        dispatch!(self, d => d.close().await);
    }
}

impl<F: TransportFactory> fmt::Debug for ManagedDevice<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedDevice")
            .field("kind", &self.kind())
            .field("alias", &self.alias())
            .finish()
    }
}
