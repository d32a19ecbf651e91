// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device state machine.
//!
//! A [`Device`] owns a universe, its scenes and a [`Transport`]. It starts
//! `Disconnected`; a background task connects it, re-pushes the universe
//! after every reconnect and probes it on a fixed interval.
//!
//! ```text
//!              connect + push ok
//! Disconnected ─────────────────▶ Connected
//!      ▲                              │
//!      └──────────────────────────────┘
//!         probe failed / push failed
//! ```
//!
//! Every command checks connectivity first and fails with
//! [`DeviceError::NoConnection`] while disconnected.

mod reconnect;
mod settings;
mod state;

pub use settings::{ConnectionState, DEFAULT_PROBE_TIMEOUT, DeviceSettings};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::Cache;
use crate::error::DeviceError;
use crate::signal::{Signal, SignalBus};
use crate::transport::Transport;
use crate::types::{Scene, Universe};

use state::DeviceCore;

/// A lighting device driven through a transport `T`.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use dmx_executor::cache::MemoryCache;
/// use dmx_executor::device::{Device, DeviceSettings};
/// use dmx_executor::signal::SignalBus;
/// use dmx_executor::transport::EnttecTransport;
///
/// # async fn example() -> Result<(), dmx_executor::error::DeviceError> {
/// let device = Device::spawn(
///     DeviceSettings::new("stage"),
///     EnttecTransport::new("/dev/ttyUSB0", 57_600),
///     Arc::new(MemoryCache::new()),
///     SignalBus::new(),
/// );
///
/// device.blackout().await?;
/// device.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Device<T: Transport> {
    alias: String,
    core: Arc<Mutex<DeviceCore<T>>>,
    signals: SignalBus,
    cancel: CancellationToken,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    close_timeout: std::time::Duration,
}

impl<T: Transport> fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("alias", &self.alias)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Device<T> {
    /// Creates the device and starts its reconnect loop.
    ///
    /// Cached universe and scenes replace the defaults when they decode and
    /// match the configured scene layout. The first configured scene becomes
    /// the current scene.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        settings: DeviceSettings,
        transport: T,
        cache: Arc<dyn Cache>,
        signals: SignalBus,
    ) -> Self {
        let alias = settings.alias.clone();
        let interval = settings.reconnect_interval;
        let probe_timeout = settings.probe_timeout;

        let core = Arc::new(Mutex::new(DeviceCore::restore(settings, transport, cache)));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(reconnect::run(
            alias.clone(),
            Arc::clone(&core),
            interval,
            probe_timeout,
            cancel.clone(),
        ));

        Self {
            alias,
            core,
            signals,
            cancel,
            task: parking_lot::Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
            close_timeout: probe_timeout,
        }
    }

    /// Returns the device alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Returns `true` if the device is connected.
    pub async fn is_connected(&self) -> bool {
        self.connection_state().await.is_connected()
    }

    /// Returns the connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.core.lock().await.state
    }

    /// Returns a snapshot of the universe.
    pub async fn universe(&self) -> Universe {
        self.core.lock().await.universe.clone()
    }

    /// Returns the alias of the current scene.
    pub async fn current_scene(&self) -> Option<String> {
        self.core.lock().await.current_scene.clone()
    }

    /// Returns a snapshot of a scene.
    pub async fn scene(&self, scene_alias: &str) -> Option<Scene> {
        let core = self.core.lock().await;
        core.scene_index(scene_alias).map(|i| core.scenes[i].clone())
    }

    /// Returns the scene aliases in configuration order.
    pub async fn scene_aliases(&self) -> Vec<String> {
        self.core
            .lock()
            .await
            .scenes
            .iter()
            .map(|s| s.alias().to_string())
            .collect()
    }

    /// Selects a scene and writes its saved values into the universe.
    ///
    /// Emits [`Signal::SceneChanged`] once the universe has been pushed.
    ///
    /// # Errors
    ///
    /// Returns `NoConnection`, `UnknownScene`, or `Transport` if the push
    /// fails.
    pub async fn set_scene(&self, scene_alias: &str) -> Result<(), DeviceError> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.ensure_connected()?;

        let index = core
            .scene_index(scene_alias)
            .ok_or_else(|| DeviceError::UnknownScene(scene_alias.to_string()))?;
        core.scenes[index].apply(&mut core.universe);
        core.current_scene = Some(scene_alias.to_string());
        core.persist_universe();
        core.push().await?;

        tracing::info!(device = %self.alias, scene = %scene_alias, "Scene changed");
        self.signals
            .publish(Signal::scene_changed(&self.alias, scene_alias));
        Ok(())
    }

    /// Stores the universe values of the current scene's channels.
    ///
    /// Emits [`Signal::SceneSaved`].
    ///
    /// # Errors
    ///
    /// Returns `NoConnection` or `NoSceneSelected`.
    pub async fn save_scene(&self) -> Result<(), DeviceError> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.ensure_connected()?;

        let index = core.current_scene_index()?;
        core.scenes[index].capture(&core.universe);
        core.persist_scene(index);

        let scene_alias = core.scenes[index].alias().to_string();
        tracing::info!(device = %self.alias, scene = %scene_alias, "Scene saved");
        self.signals
            .publish(Signal::scene_saved(&self.alias, scene_alias));
        Ok(())
    }

    /// Sets a channel of the current scene.
    ///
    /// # Errors
    ///
    /// Returns `NoConnection`, `NoSceneSelected`, `ChannelNotInScene`,
    /// `ChannelValueOutOfRange` if `value` is outside 0-255, or `Transport`
    /// if the push fails.
    pub async fn set_channel(&self, scene_channel: u16, value: i32) -> Result<(), DeviceError> {
        let mut core = self.core.lock().await;
        core.ensure_connected()?;

        let channel = core.resolve_channel(scene_channel)?;
        let value =
            u8::try_from(value).map_err(|_| DeviceError::ChannelValueOutOfRange { value })?;
        core.write_channel(channel, value).await
    }

    /// Adds `delta` to a channel of the current scene.
    ///
    /// # Errors
    ///
    /// Returns `NoConnection`, `NoSceneSelected`, `ChannelNotInScene`,
    /// `ChannelValueOutOfRange` if the result is outside 0-255, or
    /// `Transport` if the push fails.
    pub async fn increment_channel(&self, scene_channel: u16, delta: i32) -> Result<(), DeviceError> {
        let mut core = self.core.lock().await;
        core.ensure_connected()?;

        let channel = core.resolve_channel(scene_channel)?;
        let value = i32::from(core.universe.get(channel)).saturating_add(delta);
        let value =
            u8::try_from(value).map_err(|_| DeviceError::ChannelValueOutOfRange { value })?;
        core.write_channel(channel, value).await
    }

    /// Zeroes every channel outside the non-blackout set and pushes the
    /// universe. Does not need a current scene.
    ///
    /// # Errors
    ///
    /// Returns `NoConnection`, or `Transport` if the push fails.
    pub async fn blackout(&self) -> Result<(), DeviceError> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.ensure_connected()?;

        core.universe.blackout(&core.non_blackout);
        core.persist_universe();
        core.push().await
    }

    /// Stops the reconnect loop and releases the transport.
    ///
    /// Safe to call more than once and while a probe is in flight.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            let abort = task.abort_handle();
            if tokio::time::timeout(self.close_timeout, task).await.is_err() {
                tracing::warn!(device = %self.alias, "Reconnect loop did not stop in time, aborting");
                abort.abort();
            }
        }

        self.core.lock().await.disconnect();
        tracing::debug!(device = %self.alias, "Device closed");
    }
}

impl<T: Transport> Drop for Device<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
