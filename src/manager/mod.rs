// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for coordinating DMX and Art-Net devices.
//!
//! The [`DeviceManager`] owns every device, keyed by alias. It provides:
//!
//! - **Reconciliation**: [`DeviceManager::update_devices`] diffs the registry
//!   against a configuration snapshot. Unchanged devices keep running,
//!   changed ones are rebuilt and removed ones are closed.
//! - **Command routing**: commands are dispatched by device alias; device
//!   errors come back wrapped with the alias.
//! - **Signals**: every device publishes scene signals into one channel that
//!   callers subscribe to with [`DeviceManager::signals`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dmx_executor::cache::MemoryCache;
//! use dmx_executor::command::SetScene;
//! use dmx_executor::config::UserConfig;
//! use dmx_executor::manager::DeviceManager;
//! use dmx_executor::transport::HardwareTransports;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = HardwareTransports::bind("0.0.0.0:6454".parse()?).await?;
//!     let manager = DeviceManager::new(factory, Arc::new(MemoryCache::new()));
//!
//!     let config = UserConfig::from_path("devices.yaml")?;
//!     manager.update_devices(&config).await;
//!
//!     let mut signals = manager.signals();
//!     manager.process_set_scene(&SetScene::new("stage", "day")).await?;
//!     println!("{:?}", signals.recv().await?);
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

mod device_manager;
mod managed_device;

pub use device_manager::{DeviceManager, UpdateSummary};
pub use managed_device::ManagedDevice;
