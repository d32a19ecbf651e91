// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware transports that carry a rendered universe to a device.
//!
//! A [`Transport`] is owned by exactly one device and is only ever used
//! behind that device's lock, so implementations take `&mut self` and need
//! no internal synchronization.
//!
//! # Transports
//!
//! - [`EnttecTransport`]: Enttec DMX USB Pro style widget on a serial port
//! - [`ArtNetTransport`]: Art-Net node reached over UDP through a shared
//!   [`ArtNetController`]
//!
//! Transports are built by a [`TransportFactory`]. [`HardwareTransports`] is
//! the production factory; tests inject their own.

mod artnet;
mod enttec;
#[cfg(test)]
pub(crate) mod mock;

pub use artnet::{
    ARTNET_PROTOCOL_VERSION, ArtNetController, ArtNetTransport, DEFAULT_POLL_TIMEOUT,
    art_dmx_packet, art_poll_packet, is_art_poll_reply,
};
pub use enttec::{ENTTEC_FRAME_LEN, EnttecTransport, enttec_frame};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{ArtNetConfig, DmxConfig};
use crate::error::TransportError;
use crate::types::Universe;

/// Connection to one physical device.
pub trait Transport: Send + 'static {
    /// Opens the handle, or checks that the remote end is reachable.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the device cannot be reached.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends the full 512-channel frame.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the handle is closed or the write fails.
    fn push_frame(
        &mut self,
        universe: &Universe,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Checks that the device is still reachable without changing its output.
    fn probe(&mut self) -> impl Future<Output = bool> + Send;

    /// Releases the handle. Calling it on a closed transport does nothing.
    fn close(&mut self);

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Builds transports from device configuration.
pub trait TransportFactory: Send + Sync + 'static {
    /// Transport used by serial DMX devices.
    type Dmx: Transport;
    /// Transport used by Art-Net devices.
    type ArtNet: Transport;

    /// Creates the transport of a serial DMX device. Does not open it.
    fn dmx(&self, config: &DmxConfig) -> Self::Dmx;

    /// Creates the transport of an Art-Net device. Does not contact the node.
    fn artnet(&self, config: &ArtNetConfig) -> Self::ArtNet;
}

/// Factory for real hardware.
///
/// Every Art-Net transport it creates shares the one [`ArtNetController`]
/// handed to [`HardwareTransports::new`].
#[derive(Debug, Clone)]
pub struct HardwareTransports {
    artnet: Arc<ArtNetController>,
}

impl HardwareTransports {
    /// Creates a factory around an existing controller.
    #[must_use]
    pub fn new(artnet: Arc<ArtNetController>) -> Self {
        Self { artnet }
    }

    /// Binds a new Art-Net controller on `bind` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the UDP socket cannot be bound.
    pub async fn bind(bind: SocketAddr) -> Result<Self, TransportError> {
        Ok(Self::new(ArtNetController::bind(bind).await?))
    }

    /// Returns the shared Art-Net controller.
    #[must_use]
    pub fn artnet_controller(&self) -> &Arc<ArtNetController> {
        &self.artnet
    }
}

impl TransportFactory for HardwareTransports {
    type Dmx = EnttecTransport;
    type ArtNet = ArtNetTransport;

    fn dmx(&self, config: &DmxConfig) -> EnttecTransport {
        EnttecTransport::new(config.path.clone(), config.baud_rate)
    }

    fn artnet(&self, config: &ArtNetConfig) -> ArtNetTransport {
        ArtNetTransport::from_config(Arc::clone(&self.artnet), config)
    }
}
