// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `dmx_executor` - a lighting-control agent for DMX512 devices.
//!
//! This library drives 512-channel universes on devices attached through
//! Enttec USB serial widgets or reached over Art-Net, and executes a small
//! command set against them.
//!
//! # Supported Features
//!
//! - **Commands**: set or increment a scene channel, blackout, select a
//!   scene, save a scene
//! - **Scenes**: small logical channel ids mapped onto universe positions
//! - **Auto-reconnection**: every device runs a reconnect and health-check
//!   loop and re-pushes its universe after reconnecting
//! - **Persistence**: universes and scenes survive restarts through a
//!   key-value [`cache`]
//! - **Reconciliation**: the device set follows configuration reloads
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dmx_executor::cache::FileCache;
//! use dmx_executor::command::{SetChannel, SetScene};
//! use dmx_executor::config::UserConfig;
//! use dmx_executor::manager::DeviceManager;
//! use dmx_executor::transport::HardwareTransports;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = UserConfig::from_path("devices.yaml")?;
//!     let cache = Arc::new(FileCache::open("dmx-cache.json")?);
//!     let factory = HardwareTransports::bind("0.0.0.0:6454".parse()?).await?;
//!
//!     let manager = DeviceManager::new(factory, cache);
//!     manager.update_devices(&config).await;
//!
//!     manager.process_set_scene(&SetScene::new("stage", "day")).await?;
//!     manager.process_set_channel(&SetChannel::new("stage", 1, 200)).await?;
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod manager;
pub mod signal;
pub mod transport;
pub mod types;

pub use command::Command;
pub use config::UserConfig;
pub use device::{ConnectionState, Device};
pub use error::{DeviceError, Error, Result, TransportError};
pub use manager::DeviceManager;
pub use signal::Signal;
pub use types::{ChannelId, Scene, Universe};
