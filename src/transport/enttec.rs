// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enttec DMX USB Pro widget on a serial port.
//!
//! Frames use the widget's "Output Only Send DMX Packet" message:
//!
//! ```text
//! 0x7E | label 6 | len lo | len hi | start code 0 | 512 data bytes | 0xE7
//! ```

use std::io::Write;
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};

use super::Transport;
use crate::error::TransportError;
use crate::types::{UNIVERSE_SIZE, Universe};

const START_OF_MESSAGE: u8 = 0x7E;
const END_OF_MESSAGE: u8 = 0xE7;
const SEND_DMX_LABEL: u8 = 6;
const DMX_START_CODE: u8 = 0;

/// Length of an encoded frame.
pub const ENTTEC_FRAME_LEN: usize = UNIVERSE_SIZE + 6;

/// Serial read/write timeout.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Wraps a universe in an Enttec "Send DMX Packet" message.
///
/// # Examples
///
/// ```
/// use dmx_executor::transport::{ENTTEC_FRAME_LEN, enttec_frame};
/// use dmx_executor::types::Universe;
///
/// let frame = enttec_frame(&Universe::new());
/// assert_eq!(frame.len(), ENTTEC_FRAME_LEN);
/// assert_eq!(&frame[..5], &[0x7E, 6, 0x01, 0x02, 0]);
/// assert_eq!(frame[ENTTEC_FRAME_LEN - 1], 0xE7);
/// ```
#[must_use]
pub fn enttec_frame(universe: &Universe) -> Vec<u8> {
    // payload is the start code plus the channel data
    let [len_lo, len_hi] = u16::try_from(UNIVERSE_SIZE + 1)
        .unwrap_or(u16::MAX)
        .to_le_bytes();

    let mut frame = Vec::with_capacity(ENTTEC_FRAME_LEN);
    frame.extend_from_slice(&[START_OF_MESSAGE, SEND_DMX_LABEL, len_lo, len_hi, DMX_START_CODE]);
    frame.extend_from_slice(universe.as_bytes());
    frame.push(END_OF_MESSAGE);
    frame
}

/// Serial transport for one Enttec widget.
///
/// Serial I/O is blocking, so every operation runs on tokio's blocking pool
/// and moves the port handle in and out of the worker.
pub struct EnttecTransport {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
    last_frame: Option<Vec<u8>>,
}

impl std::fmt::Debug for EnttecTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnttecTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl EnttecTransport {
    /// Creates a closed transport for the widget at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            port: None,
            last_frame: None,
        }
    }

    /// Returns the serial device path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` if the serial port is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let mut port = self.port.take().ok_or(TransportError::NotOpen)?;

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&frame).and_then(|()| port.flush());
            (port, result)
        })
        .await
        .map_err(|e| TransportError::Worker(e.to_string()))?;

        // a failed write leaves the port closed
        if result.is_ok() {
            self.port = Some(port);
        }
        result.map_err(TransportError::from)
    }
}

impl Transport for EnttecTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.close();

        let path = self.path.clone();
        let baud_rate = self.baud_rate;
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(path, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::Two)
                .timeout(SERIAL_TIMEOUT)
                .open()
        })
        .await
        .map_err(|e| TransportError::Worker(e.to_string()))??;

        tracing::debug!(path = %self.path, baud_rate, "Opened serial port");
        self.port = Some(port);
        Ok(())
    }

    async fn push_frame(&mut self, universe: &Universe) -> Result<(), TransportError> {
        let frame = enttec_frame(universe);
        self.write(frame.clone()).await?;
        self.last_frame = Some(frame);
        Ok(())
    }

    async fn probe(&mut self) -> bool {
        // re-sending the last frame leaves the output unchanged
        let frame = self
            .last_frame
            .clone()
            .unwrap_or_else(|| enttec_frame(&Universe::new()));

        match self.write(frame).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(path = %self.path, error = %e, "Serial probe failed");
                false
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!(path = %self.path, "Closed serial port");
        }
    }

    fn describe(&self) -> String {
        format!("enttec {} @ {} baud", self.path, self.baud_rate)
    }
}
