// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the DMX executor.
//!
//! Errors are split by the layer that produces them: device operations,
//! hardware transports, the persistence codec, configuration loading and the
//! cache backends. The manager wraps device errors with the alias of the
//! device that produced them.

use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type returned to command callers.
#[derive(Debug, Error)]
pub enum Error {
    /// A device operation failed.
    #[error("device '{alias}': {source}")]
    Device {
        /// Alias of the device that rejected the operation.
        alias: String,
        /// The underlying device error.
        #[source]
        source: DeviceError,
    },

    /// No device with this alias is registered.
    #[error("device with alias '{0}' not found")]
    DeviceNotFound(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The cache backend failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl Error {
    /// Wraps a device error with the alias of the device.
    #[must_use]
    pub fn device(alias: impl Into<String>, source: DeviceError) -> Self {
        Self::Device {
            alias: alias.into(),
            source,
        }
    }

    /// Returns the device error if this error came from a device operation.
    #[must_use]
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            Self::Device { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised by device command operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device is currently disconnected.
    #[error("no connection to device")]
    NoConnection,

    /// The operation needs a current scene but none is selected.
    #[error("no scene is selected")]
    NoSceneSelected,

    /// The requested scene is not configured on the device.
    #[error("invalid scene alias '{0}'")]
    UnknownScene(String),

    /// The scene channel is not part of the current scene.
    #[error("channel '{channel}' doesn't belong to current scene '{scene}'")]
    ChannelNotInScene {
        /// The scene channel id that was requested.
        channel: u16,
        /// Alias of the current scene.
        scene: String,
    },

    /// The resulting channel value does not fit in one byte.
    #[error("channel value '{value}' out of range [0, 255]")]
    ChannelValueOutOfRange {
        /// The rejected value.
        value: i32,
    },

    /// Pushing the frame to hardware failed; the device is now disconnected.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by hardware transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The transport handle is not open.
    #[error("transport is not open")]
    NotOpen,

    /// The configured address could not be used.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The operation did not complete in time.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// The Art-Net node did not answer the poll.
    #[error("art-net node {0} is not registered")]
    NodeNotRegistered(IpAddr),

    /// A blocking worker was cancelled or panicked.
    #[error("transport worker failed: {0}")]
    Worker(String),
}

/// Errors raised while decoding cached universes and scenes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The encoded string is not a whole number of 9-character records.
    #[error("invalid record sequence length {0}")]
    InvalidLength(usize),

    /// A field is not a 3-digit decimal number.
    #[error("field '{field}' at offset {offset} is not numeric")]
    NotNumeric {
        /// Byte offset of the record.
        offset: usize,
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field is outside its allowed range.
    #[error("field '{field}' value {value} out of range [0, {max}]")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The decoded value.
        value: u16,
        /// Largest allowed value.
        max: u16,
    },

    /// A run ends before it starts.
    #[error("run start {first} is greater than run end {last}")]
    InvertedRun {
        /// First channel of the run.
        first: u16,
        /// Last channel of the run.
        last: u16,
    },

    /// A run does not start right after the previous one.
    #[error("run starts at {actual}, expected {expected}")]
    NonContiguous {
        /// Channel the run was expected to start at.
        expected: u16,
        /// Channel the run actually starts at.
        actual: u16,
    },

    /// The runs do not cover the whole universe.
    #[error("runs cover only {covered} of 512 channels")]
    IncompleteUniverse {
        /// Number of channels covered by the decoded runs.
        covered: usize,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two devices share the same alias.
    #[error("found duplicate device with alias '{0}' in config")]
    DuplicateAlias(String),

    /// A required field is empty or absent.
    #[error("device #{index}: valid {field} must be provided in config")]
    MissingField {
        /// Position of the entry within its device list.
        index: usize,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A scene references a universe channel outside 0..=511.
    #[error("device '{alias}', scene '{scene}': universe channel {channel} out of range [0, 511]")]
    InvalidChannel {
        /// Alias of the device.
        alias: String,
        /// Alias of the scene.
        scene: String,
        /// The rejected universe channel id.
        channel: u16,
    },

    /// A scene channel id does not fit the 0..=511 range the scene cache
    /// records can hold.
    #[error("device '{alias}', scene '{scene}': scene channel {channel} out of range [0, 511]")]
    InvalidSceneChannel {
        /// Alias of the device.
        alias: String,
        /// Alias of the scene.
        scene: String,
        /// The rejected scene channel id.
        channel: u16,
    },

    /// Two scenes of one device share the same alias.
    #[error("device '{alias}': found duplicate scene '{scene}' in config")]
    DuplicateScene {
        /// Alias of the device.
        alias: String,
        /// The repeated scene alias.
        scene: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing failed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file extension is not recognized.
    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the backing file failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not valid JSON.
    #[error("cache file is corrupted: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
