// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast};

use super::managed_device::ManagedDevice;
use crate::cache::Cache;
use crate::command::{Blackout, Command, IncrementChannel, SaveScene, SetChannel, SetScene};
use crate::config::{DeviceConfig, UserConfig};
use crate::device::Device;
use crate::error::{ConfigError, Error, Result};
use crate::signal::{Signal, SignalBus};
use crate::transport::{HardwareTransports, TransportFactory};
use crate::types::Universe;

struct Entry<F: TransportFactory> {
    config: DeviceConfig,
    device: Arc<ManagedDevice<F>>,
}

/// Outcome of one [`DeviceManager::update_devices`] pass.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Aliases of newly created devices.
    pub added: Vec<String>,
    /// Aliases of devices rebuilt because their configuration changed.
    pub replaced: Vec<String>,
    /// Aliases of devices closed because they left the configuration.
    pub removed: Vec<String>,
    /// Aliases of devices kept as they were.
    pub unchanged: Vec<String>,
    /// Entries skipped because they failed validation.
    pub rejected: Vec<ConfigError>,
}

/// Registry of devices keyed by alias.
///
/// The manager reconciles its devices against configuration snapshots,
/// routes commands by alias and hands out receivers for the signals every
/// device publishes.
pub struct DeviceManager<F: TransportFactory = HardwareTransports> {
    factory: F,
    cache: Arc<dyn Cache>,
    signals: SignalBus,
    devices: RwLock<HashMap<String, Entry<F>>>,
    reconcile: Mutex<()>,
}

impl<F: TransportFactory> std::fmt::Debug for DeviceManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

impl<F: TransportFactory> DeviceManager<F> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(factory: F, cache: Arc<dyn Cache>) -> Self {
        Self::with_signal_capacity(factory, cache, crate::signal::DEFAULT_SIGNAL_CAPACITY)
    }

    /// Creates an empty manager whose signal channel buffers `capacity`
    /// signals per subscriber.
    #[must_use]
    pub fn with_signal_capacity(factory: F, cache: Arc<dyn Cache>, capacity: usize) -> Self {
        Self {
            factory,
            cache,
            signals: SignalBus::with_capacity(capacity),
            devices: RwLock::new(HashMap::new()),
            reconcile: Mutex::new(()),
        }
    }

    /// Returns a receiver for scene signals of every device.
    #[must_use]
    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Reconciles the registry with a configuration snapshot.
    ///
    /// Devices whose alias disappeared or whose configuration changed are
    /// closed first; new and changed entries are then built. Devices whose
    /// configuration is unchanged keep running with their in-memory state.
    /// Invalid entries are logged and skipped.
    ///
    /// Stale devices are closed outside the registry lock, so commands to
    /// other devices keep flowing. Concurrent calls run one at a time.
    pub async fn update_devices(&self, config: &UserConfig) -> UpdateSummary {
        let (valid, rejected) = config.validate_entries();
        for err in &rejected {
            tracing::warn!(error = %err, "Skipping invalid device configuration");
        }

        let mut summary = UpdateSummary {
            rejected,
            ..UpdateSummary::default()
        };
        let desired: HashMap<&str, &DeviceConfig> =
            valid.iter().map(|c| (c.alias(), c)).collect();

        let _reconcile = self.reconcile.lock().await;

        let stale: Vec<(String, Entry<F>)> = {
            let mut devices = self.devices.write().await;
            let aliases: Vec<String> = devices
                .iter()
                .filter(|(alias, entry)| {
                    desired
                        .get(alias.as_str())
                        .is_none_or(|config| **config != entry.config)
                })
                .map(|(alias, _)| alias.clone())
                .collect();
            aliases
                .into_iter()
                .filter_map(|alias| devices.remove(&alias).map(|entry| (alias, entry)))
                .collect()
        };

        for (alias, entry) in stale {
            entry.device.close().await;
            if desired.contains_key(alias.as_str()) {
                summary.replaced.push(alias);
            } else {
                tracing::info!(device = %alias, "Device removed");
                summary.removed.push(alias);
            }
        }

        let mut devices = self.devices.write().await;
        for config in valid {
            let alias = config.alias().to_string();
            if devices.contains_key(&alias) {
                summary.unchanged.push(alias);
                continue;
            }

            let device = match self.build(&config) {
                Ok(device) => device,
                Err(e) => {
                    tracing::warn!(device = %alias, error = %e, "Failed to create device");
                    summary.replaced.retain(|a| *a != alias);
                    summary.rejected.push(e);
                    continue;
                }
            };

            tracing::info!(device = %alias, kind = device.kind(), "Device added");
            if !summary.replaced.contains(&alias) {
                summary.added.push(alias.clone());
            }
            devices.insert(
                alias,
                Entry {
                    config,
                    device: Arc::new(device),
                },
            );
        }

        summary
    }

    fn build(&self, config: &DeviceConfig) -> std::result::Result<ManagedDevice<F>, ConfigError> {
        let settings = config.settings()?;
        let cache = Arc::clone(&self.cache);
        let signals = self.signals.clone();

        Ok(match config {
            DeviceConfig::Dmx(c) => {
                ManagedDevice::Dmx(Device::spawn(settings, self.factory.dmx(c), cache, signals))
            }
            DeviceConfig::ArtNet(c) => ManagedDevice::ArtNet(Device::spawn(
                settings,
                self.factory.artnet(c),
                cache,
                signals,
            )),
        })
    }

    /// Returns a device by alias.
    pub async fn device(&self, alias: &str) -> Option<Arc<ManagedDevice<F>>> {
        self.devices
            .read()
            .await
            .get(alias)
            .map(|entry| Arc::clone(&entry.device))
    }

    /// Returns the aliases of all devices, sorted.
    pub async fn device_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.devices.read().await.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Returns the number of devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Returns `true` if the device exists and is connected.
    pub async fn is_connected(&self, alias: &str) -> bool {
        match self.device(alias).await {
            Some(device) => device.is_connected().await,
            None => false,
        }
    }

    /// Returns a snapshot of a device's universe.
    pub async fn universe(&self, alias: &str) -> Option<Universe> {
        match self.device(alias).await {
            Some(device) => Some(device.universe().await),
            None => None,
        }
    }

    /// Closes and removes every device.
    pub async fn shutdown(&self) {
        let entries: Vec<Entry<F>> = self.devices.write().await.drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.device.close().await;
        }
        tracing::info!(count = entries.len(), "Device manager shut down");
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Dispatches any command.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown alias, or the device error
    /// wrapped with the alias.
    pub async fn process(&self, command: &Command) -> Result<()> {
        match command {
            Command::SetChannel(cmd) => self.process_set_channel(cmd).await,
            Command::IncrementChannel(cmd) => self.process_increment_channel(cmd).await,
            Command::Blackout(cmd) => self.process_blackout(cmd).await,
            Command::SetScene(cmd) => self.process_set_scene(cmd).await,
            Command::SaveScene(cmd) => self.process_save_scene(cmd).await,
        }
    }

    /// Sets a channel of the current scene.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown alias, or the device error
    /// wrapped with the alias.
    pub async fn process_set_channel(&self, cmd: &SetChannel) -> Result<()> {
        let device = self.require(&cmd.device_alias, cmd.code()).await?;
        device
            .set_channel(cmd.channel, cmd.value)
            .await
            .map_err(|e| Error::device(&cmd.device_alias, e))
    }

    /// Increments a channel of the current scene.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown alias, or the device error
    /// wrapped with the alias.
    pub async fn process_increment_channel(&self, cmd: &IncrementChannel) -> Result<()> {
        let device = self.require(&cmd.device_alias, cmd.code()).await?;
        device
            .increment_channel(cmd.channel, cmd.value)
            .await
            .map_err(|e| Error::device(&cmd.device_alias, e))
    }

    /// Blacks out a device.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown alias, or the device error
    /// wrapped with the alias.
    pub async fn process_blackout(&self, cmd: &Blackout) -> Result<()> {
        let device = self.require(&cmd.device_alias, cmd.code()).await?;
        device
            .blackout()
            .await
            .map_err(|e| Error::device(&cmd.device_alias, e))
    }

    /// Selects a scene.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown alias, or the device error
    /// wrapped with the alias.
    pub async fn process_set_scene(&self, cmd: &SetScene) -> Result<()> {
        let device = self.require(&cmd.device_alias, cmd.code()).await?;
        device
            .set_scene(&cmd.scene_alias)
            .await
            .map_err(|e| Error::device(&cmd.device_alias, e))
    }

    /// Saves the current scene.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown alias, or the device error
    /// wrapped with the alias.
    pub async fn process_save_scene(&self, cmd: &SaveScene) -> Result<()> {
        let device = self.require(&cmd.device_alias, cmd.code()).await?;
        device
            .save_scene()
            .await
            .map_err(|e| Error::device(&cmd.device_alias, e))
    }

    async fn require(&self, alias: &str, code: &str) -> Result<Arc<ManagedDevice<F>>> {
        tracing::debug!(device = %alias, command = %code, "Processing command");
        self.device(alias)
            .await
            .ok_or_else(|| Error::DeviceNotFound(alias.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::{ArtNetConfig, DmxConfig, SceneConfig};
    use crate::error::DeviceError;
    use crate::transport::mock::MockFactory;
    use crate::types::ChannelId;

    fn stage() -> DmxConfig {
        DmxConfig::new("stage", "/dev/ttyUSB0")
            .with_scene(SceneConfig::new("day").with_channel(1, 10))
    }

    fn hall() -> ArtNetConfig {
        ArtNetConfig::new("hall", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20)))
            .with_scene(SceneConfig::new("night").with_channel(1, 0))
    }

    fn config(dmx: Vec<DmxConfig>, artnet: Vec<ArtNetConfig>) -> UserConfig {
        UserConfig {
            dmx_devices: dmx,
            artnet_devices: artnet,
        }
    }

    fn manager() -> (DeviceManager<MockFactory>, MockFactory, Arc<MemoryCache>) {
        let factory = MockFactory::new();
        let cache = Arc::new(MemoryCache::new());
        let manager = DeviceManager::new(factory.clone(), Arc::clone(&cache) as Arc<dyn Cache>);
        (manager, factory, cache)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn update_adds_devices_of_both_kinds() {
        let (manager, factory, _) = manager();

        let summary = manager
            .update_devices(&config(vec![stage()], vec![hall()]))
            .await;
        settle().await;

        assert_eq!(summary.added, ["stage", "hall"]);
        assert!(summary.rejected.is_empty());
        assert_eq!(manager.device_aliases().await, ["hall", "stage"]);
        assert_eq!(manager.device_count().await, 2);
        assert!(manager.is_connected("stage").await);
        assert!(manager.is_connected("hall").await);
        assert_eq!(manager.device("hall").await.unwrap().kind(), "artnet");
        assert_eq!(factory.created(), ["stage", "hall"]);
    }

    #[tokio::test(start_paused = true)]
    async fn update_skips_invalid_entries() {
        let (manager, _, _) = manager();

        let summary = manager
            .update_devices(&config(
                vec![stage(), DmxConfig::new("", "/dev/ttyUSB1"), DmxConfig::new("stage", "/dev/x")],
                vec![hall()],
            ))
            .await;

        assert_eq!(summary.added, ["stage", "hall"]);
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(manager.device_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_devices_keep_running() {
        let (manager, factory, _) = manager();
        manager.update_devices(&config(vec![stage()], vec![])).await;
        settle().await;
        manager
            .process_set_channel(&SetChannel::new("stage", 1, 77))
            .await
            .unwrap();

        let summary = manager
            .update_devices(&config(vec![stage()], vec![hall()]))
            .await;

        assert_eq!(summary.unchanged, ["stage"]);
        assert_eq!(summary.added, ["hall"]);
        assert_eq!(factory.created(), ["stage", "hall"]);
        let universe = manager.universe("stage").await.unwrap();
        assert_eq!(universe.get(ChannelId::new(10).unwrap()), 77);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_and_removed_devices_are_closed() {
        let (manager, factory, _) = manager();
        manager
            .update_devices(&config(vec![stage()], vec![hall()]))
            .await;
        settle().await;
        let old_stage = factory.transport("stage").unwrap();
        let old_hall = factory.transport("hall").unwrap();

        let summary = manager
            .update_devices(&config(vec![stage().with_baud_rate(115_200)], vec![]))
            .await;
        settle().await;

        assert_eq!(summary.replaced, ["stage"]);
        assert_eq!(summary.removed, ["hall"]);
        assert!(summary.added.is_empty());
        assert!(!old_stage.is_open());
        assert!(!old_hall.is_open());
        assert_eq!(manager.device_aliases().await, ["stage"]);
        assert!(factory.transport("stage").unwrap().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_keep_flowing_while_removed_device_closes() {
        let (manager, factory, _) = manager();
        manager
            .update_devices(&config(vec![stage()], vec![hall()]))
            .await;
        settle().await;
        factory
            .transport("hall")
            .unwrap()
            .set_push_delay(Duration::from_secs(10));

        // the slow hall command holds the device while the reload closes it
        let hall_blackout = Blackout::new("hall");
        let reload_config = config(vec![stage()], vec![]);
        let slow_hall = manager.process_blackout(&hall_blackout);
        let reload = manager.update_devices(&reload_config);
        let stage_command = async {
            settle().await;
            tokio::time::timeout(
                Duration::from_secs(1),
                manager.process_blackout(&Blackout::new("stage")),
            )
            .await
        };

        let (hall_result, summary, stage_result) = tokio::join!(slow_hall, reload, stage_command);

        assert!(hall_result.is_ok());
        assert_eq!(summary.removed, ["hall"]);
        assert!(matches!(stage_result, Ok(Ok(()))), "stage command waited on the reload");
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_device_restores_from_cache() {
        let (manager, _, cache) = manager();
        manager.update_devices(&config(vec![stage()], vec![])).await;
        settle().await;
        manager
            .process_set_channel(&SetChannel::new("stage", 1, 33))
            .await
            .unwrap();
        assert!(cache.get("stage_universe").unwrap().is_some());

        manager
            .update_devices(&config(vec![stage().with_reconnect_interval(5000)], vec![]))
            .await;

        let universe = manager.universe("stage").await.unwrap();
        assert_eq!(universe.get(ChannelId::new(10).unwrap()), 33);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_alias_fails_for_every_command() {
        let (manager, _, _) = manager();
        manager.update_devices(&config(vec![stage()], vec![])).await;

        let commands: [Command; 5] = [
            SetChannel::new("ghost", 1, 1).into(),
            IncrementChannel::new("ghost", 1, 1).into(),
            Blackout::new("ghost").into(),
            SetScene::new("ghost", "day").into(),
            SaveScene::new("ghost").into(),
        ];

        for command in &commands {
            assert!(
                matches!(manager.process(command).await, Err(Error::DeviceNotFound(ref a)) if a == "ghost"),
                "{}",
                command.code()
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn device_errors_carry_alias() {
        let (manager, factory, _) = manager();
        manager.update_devices(&config(vec![stage()], vec![])).await;
        settle().await;

        let err = manager
            .process(&SetScene::new("stage", "dusk").into())
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            Error::Device { alias, source: DeviceError::UnknownScene(_) } if alias == "stage"
        ));
        assert_eq!(err.to_string(), "device 'stage': invalid scene alias 'dusk'");

        factory.transport("stage").unwrap().set_connect_fails(true);
        factory.transport("stage").unwrap().set_probe_result(false);
        tokio::time::sleep(Duration::from_secs(2)).await;
        let err = manager
            .process(&Blackout::new("stage").into())
            .await
            .unwrap_err();
        assert!(matches!(err.device_error(), Some(DeviceError::NoConnection)));
    }

    #[tokio::test(start_paused = true)]
    async fn signals_reach_subscribers() {
        let (manager, _, _) = manager();
        let mut rx = manager.signals();
        manager
            .update_devices(&config(vec![stage()], vec![hall()]))
            .await;
        settle().await;

        manager
            .process(&SetScene::new("hall", "night").into())
            .await
            .unwrap();
        manager
            .process(&SaveScene::new("stage").into())
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!((first.code(), first.device_alias()), ("SceneChanged", "hall"));
        let second = rx.recv().await.unwrap();
        assert_eq!((second.code(), second.scene_alias()), ("SceneSaved", "day"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_everything() {
        let (manager, factory, _) = manager();
        manager
            .update_devices(&config(vec![stage()], vec![hall()]))
            .await;
        settle().await;

        manager.shutdown().await;

        assert_eq!(manager.device_count().await, 0);
        assert!(!factory.transport("stage").unwrap().is_open());
        assert!(!factory.transport("hall").unwrap().is_open());
    }
}
