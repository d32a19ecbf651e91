// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Art-Net over UDP.
//!
//! One [`ArtNetController`] owns the UDP socket for the whole process. It
//! sends `ArtDmx` and `ArtPoll` packets on behalf of every Art-Net device and
//! runs a listener task that records which nodes answered with
//! `ArtPollReply`. Per-device [`ArtNetTransport`]s hold the node address and
//! port address and borrow the controller through an `Arc`.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Transport;
use crate::config::ArtNetConfig;
use crate::error::TransportError;
use crate::types::{UNIVERSE_SIZE, Universe};

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_POLL: u16 = 0x2000;
const OP_POLL_REPLY: u16 = 0x2100;
const OP_DMX: u16 = 0x5000;
const HEADER_LEN: usize = 10;
/// Ask nodes to send `ArtPollReply` whenever their state changes.
const POLL_FLAGS: u8 = 0x02;

/// Art-Net protocol revision sent in every packet.
pub const ARTNET_PROTOCOL_VERSION: u16 = 14;

/// How long `connect` and `probe` wait for a node to answer a poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Builds an `ArtDmx` packet carrying a full universe.
///
/// `sequence` 0 disables sequencing on the receiving node.
#[must_use]
pub fn art_dmx_packet(sequence: u8, net: u8, sub_uni: u8, universe: &Universe) -> Vec<u8> {
    let [len_hi, len_lo] = u16::try_from(UNIVERSE_SIZE)
        .unwrap_or(u16::MAX)
        .to_be_bytes();

    let mut packet = header(OP_DMX, 18 + UNIVERSE_SIZE);
    packet.extend_from_slice(&ARTNET_PROTOCOL_VERSION.to_be_bytes());
    // physical port is informational only
    packet.extend_from_slice(&[sequence, 0, sub_uni, net & 0x7F, len_hi, len_lo]);
    packet.extend_from_slice(universe.as_bytes());
    packet
}

/// Builds an `ArtPoll` packet.
#[must_use]
pub fn art_poll_packet() -> Vec<u8> {
    let mut packet = header(OP_POLL, 14);
    packet.extend_from_slice(&ARTNET_PROTOCOL_VERSION.to_be_bytes());
    packet.extend_from_slice(&[POLL_FLAGS, 0]);
    packet
}

/// Returns `true` if `packet` is an `ArtPollReply`.
#[must_use]
pub fn is_art_poll_reply(packet: &[u8]) -> bool {
    packet.len() >= HEADER_LEN
        && packet[..8] == ARTNET_ID[..]
        && u16::from_le_bytes([packet[8], packet[9]]) == OP_POLL_REPLY
}

fn header(op: u16, capacity: usize) -> Vec<u8> {
    let mut packet = Vec::with_capacity(capacity);
    packet.extend_from_slice(ARTNET_ID);
    packet.extend_from_slice(&op.to_le_bytes());
    packet
}

#[derive(Debug, Default)]
struct NodeTable {
    last_reply: Mutex<HashMap<IpAddr, Instant>>,
    replies: Notify,
}

impl NodeTable {
    fn record(&self, ip: IpAddr) {
        self.last_reply.lock().insert(ip, Instant::now());
        self.replies.notify_waiters();
    }

    fn replied_since(&self, ip: IpAddr, since: Instant) -> bool {
        self.last_reply.lock().get(&ip).is_some_and(|at| *at >= since)
    }
}

/// Shared Art-Net socket and node registry.
///
/// Dropping the controller stops its listener task.
#[derive(Debug)]
pub struct ArtNetController {
    socket: Arc<UdpSocket>,
    nodes: Arc<NodeTable>,
    poll_timeout: Duration,
    cancel: CancellationToken,
}

impl ArtNetController {
    /// Binds the controller socket and starts listening for poll replies.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the socket cannot be bound or
    /// broadcast cannot be enabled.
    pub async fn bind(addr: SocketAddr) -> Result<Arc<Self>, TransportError> {
        Self::bind_with_poll_timeout(addr, DEFAULT_POLL_TIMEOUT).await
    }

    /// Like [`bind`](Self::bind) with a custom poll timeout.
    ///
    /// A node counts as registered for three poll timeouts after its last
    /// reply.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the socket cannot be bound or
    /// broadcast cannot be enabled.
    pub async fn bind_with_poll_timeout(
        addr: SocketAddr,
        poll_timeout: Duration,
    ) -> Result<Arc<Self>, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(true)?;

        let controller = Arc::new(Self {
            socket: Arc::new(socket),
            nodes: Arc::new(NodeTable::default()),
            poll_timeout,
            cancel: CancellationToken::new(),
        });

        tracing::debug!(addr = ?controller.local_addr().ok(), "Art-Net controller bound");

        tokio::spawn(listen(
            Arc::clone(&controller.socket),
            Arc::clone(&controller.nodes),
            controller.cancel.clone(),
        ));

        Ok(controller)
    }

    /// Returns the local address of the controller socket.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Returns the poll timeout.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Returns `true` if `ip` answered a poll within the registration window.
    #[must_use]
    pub fn is_registered(&self, ip: IpAddr) -> bool {
        let window = self.poll_timeout * 3;
        let since = Instant::now()
            .checked_sub(window)
            .unwrap_or_else(Instant::now);
        self.nodes.replied_since(ip, since)
    }

    /// Sends an `ArtPoll` to `target` without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the packet cannot be sent.
    pub async fn send_poll(&self, target: SocketAddr) -> Result<(), TransportError> {
        self.socket.send_to(&art_poll_packet(), target).await?;
        Ok(())
    }

    /// Polls `target` and waits up to the poll timeout for its reply.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::NodeNotRegistered` if the node stays silent,
    /// or `TransportError::Io` if the poll cannot be sent.
    pub async fn poll(&self, target: SocketAddr) -> Result<(), TransportError> {
        let since = Instant::now();
        let deadline = since + self.poll_timeout;
        self.send_poll(target).await?;

        loop {
            let notified = self.nodes.replies.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.nodes.replied_since(target.ip(), since) {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(TransportError::NodeNotRegistered(target.ip()));
            }
        }
    }

    /// Sends one universe as an `ArtDmx` packet.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the packet cannot be sent.
    pub async fn send_dmx(
        &self,
        target: SocketAddr,
        sequence: u8,
        net: u8,
        sub_uni: u8,
        universe: &Universe,
    ) -> Result<(), TransportError> {
        let packet = art_dmx_packet(sequence, net, sub_uni, universe);
        self.socket.send_to(&packet, target).await?;
        Ok(())
    }

    /// Stops the listener task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ArtNetController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(socket: Arc<UdpSocket>, nodes: Arc<NodeTable>, cancel: CancellationToken) {
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) if is_art_poll_reply(&buf[..len]) => {
                    tracing::trace!(node = %from, "ArtPollReply received");
                    nodes.record(from.ip());
                }
                Ok(_) => {}
                Err(e) => {
                    // ICMP port unreachable surfaces here on some platforms
                    tracing::debug!(error = %e, "Art-Net receive failed");
                }
            },
        }
    }

    tracing::debug!("Art-Net listener stopped");
}

/// Transport for one Art-Net port address on one node.
#[derive(Debug)]
pub struct ArtNetTransport {
    controller: Arc<ArtNetController>,
    target: SocketAddr,
    net: u8,
    sub_uni: u8,
    sequence: u8,
    open: bool,
}

impl ArtNetTransport {
    /// Creates a closed transport.
    #[must_use]
    pub fn new(controller: Arc<ArtNetController>, target: SocketAddr, net: u8, sub_uni: u8) -> Self {
        Self {
            controller,
            target,
            net,
            sub_uni,
            sequence: 0,
            open: false,
        }
    }

    /// Creates a transport from device configuration.
    ///
    /// A configuration without an IP gets the unspecified address, which
    /// `connect` rejects.
    #[must_use]
    pub fn from_config(controller: Arc<ArtNetController>, config: &ArtNetConfig) -> Self {
        let ip = config
            .ip
            .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
        Self::new(
            controller,
            SocketAddr::new(ip, config.port),
            config.net,
            config.sub_uni,
        )
    }

    /// Returns the node address.
    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Returns `true` after a successful `connect`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.checked_add(1).unwrap_or(1);
        self.sequence
    }
}

impl Transport for ArtNetTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.target.ip().is_unspecified() {
            return Err(TransportError::InvalidAddress(self.target.to_string()));
        }
        self.controller.poll(self.target).await?;
        self.open = true;
        Ok(())
    }

    async fn push_frame(&mut self, universe: &Universe) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let sequence = self.next_sequence();
        self.controller
            .send_dmx(self.target, sequence, self.net, self.sub_uni, universe)
            .await
    }

    async fn probe(&mut self) -> bool {
        if !self.open {
            return false;
        }
        match self.controller.poll(self.target).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(node = %self.target, error = %e, "Art-Net poll failed");
                false
            }
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn describe(&self) -> String {
        format!("art-net {} net {} sub-uni {}", self.target, self.net, self.sub_uni)
    }
}
