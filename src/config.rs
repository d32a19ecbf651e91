// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration delivered by the host.
//!
//! The configuration lists DMX (Enttec serial) devices and Art-Net devices.
//! Both carry an alias, scene definitions, the channels exempt from blackout
//! and a reconnect interval in milliseconds.
//!
//! # Examples
//!
//! ```
//! use dmx_executor::config::UserConfig;
//!
//! let yaml = r#"
//! dmx_devices:
//!   - alias: stage
//!     path: /dev/ttyUSB0
//!     non_blackout_channels: [0]
//!     scenes:
//!       - scene_alias: day
//!         channel_map:
//!           - { scene_channel_id: 1, universe_channel_id: 10 }
//! artnet_devices:
//!   - alias: hall
//!     ip: 10.0.0.20
//!     sub_uni: 1
//! "#;
//!
//! let config = UserConfig::from_yaml_str(yaml).unwrap();
//! assert_eq!(config.dmx_devices.len(), 1);
//! assert_eq!(config.artnet_devices[0].sub_uni, 1);
//! ```

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::DeviceSettings;
use crate::error::ConfigError;
use crate::types::{ChannelId, NonBlackoutChannels, Scene};

/// Lower bound applied to every configured reconnect interval.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);

/// Serial speed used when a DMX device does not configure one.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// UDP port Art-Net nodes listen on.
pub const ARTNET_PORT: u16 = 6454;

/// Top-level device configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Devices attached through an Enttec-style USB serial widget.
    #[serde(default)]
    pub dmx_devices: Vec<DmxConfig>,
    /// Devices reached through Art-Net over UDP.
    #[serde(default)]
    pub artnet_devices: Vec<ArtNetConfig>,
}

impl UserConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the JSON is malformed or validation fails.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the YAML is malformed or validation fails.
    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file, choosing the parser from its extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, has an unknown
    /// extension, is malformed or fails validation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?),
            Some("yaml" | "yml") => Self::from_yaml_str(&std::fs::read_to_string(path)?),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Returns `true` if no device is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dmx_devices.is_empty() && self.artnet_devices.is_empty()
    }

    /// Validates the whole configuration, failing on the first bad entry.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.validate_entries().1.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validates every entry independently.
    ///
    /// Returns the valid entries in configuration order (DMX devices first)
    /// and one error per rejected entry. When an alias repeats, the first
    /// entry wins and the later ones are rejected.
    #[must_use]
    pub fn validate_entries(&self) -> (Vec<DeviceConfig>, Vec<ConfigError>) {
        let mut seen = HashSet::new();
        let mut valid = Vec::new();
        let mut errors = Vec::new();

        let entries = self
            .dmx_devices
            .iter()
            .enumerate()
            .map(|(i, c)| (i, DeviceConfig::Dmx(c.clone())))
            .chain(
                self.artnet_devices
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (i, DeviceConfig::ArtNet(c.clone()))),
            );

        for (index, entry) in entries {
            match entry.check(index) {
                Err(err) => errors.push(err),
                Ok(()) if !seen.insert(entry.alias().to_string()) => {
                    errors.push(ConfigError::DuplicateAlias(entry.alias().to_string()));
                }
                Ok(()) => valid.push(entry),
            }
        }

        (valid, errors)
    }
}

/// One configured device of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceConfig {
    /// An Enttec serial device.
    Dmx(DmxConfig),
    /// An Art-Net device.
    ArtNet(ArtNetConfig),
}

impl DeviceConfig {
    /// Returns the device alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        match self {
            Self::Dmx(c) => &c.alias,
            Self::ArtNet(c) => &c.alias,
        }
    }

    /// Builds the transport-independent device settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidChannel` or
    /// `ConfigError::InvalidSceneChannel` if a scene references a channel
    /// outside 0-511, and `ConfigError::DuplicateScene` if two scenes share
    /// an alias.
    pub fn settings(&self) -> Result<DeviceSettings, ConfigError> {
        match self {
            Self::Dmx(c) => build_settings(
                &c.alias,
                &c.scenes,
                &c.non_blackout_channels,
                c.reconnect_interval,
            ),
            Self::ArtNet(c) => build_settings(
                &c.alias,
                &c.scenes,
                &c.non_blackout_channels,
                c.reconnect_interval,
            ),
        }
    }

    fn check(&self, index: usize) -> Result<(), ConfigError> {
        if self.alias().trim().is_empty() {
            return Err(ConfigError::MissingField {
                index,
                field: "alias",
            });
        }
        match self {
            Self::Dmx(c) if c.path.trim().is_empty() => {
                return Err(ConfigError::MissingField {
                    index,
                    field: "path",
                });
            }
            Self::ArtNet(c) if c.ip.is_none() => {
                return Err(ConfigError::MissingField { index, field: "ip" });
            }
            _ => {}
        }
        self.settings().map(|_| ())
    }
}

/// Configuration of a DMX device behind a USB serial widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmxConfig {
    /// Unique device alias.
    pub alias: String,
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    #[serde(default)]
    pub path: String,
    /// Serial line speed.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Scene definitions.
    #[serde(default)]
    pub scenes: Vec<SceneConfig>,
    /// Universe channels left untouched by a blackout.
    #[serde(default)]
    pub non_blackout_channels: Vec<u16>,
    /// Reconnect interval in milliseconds.
    #[serde(default)]
    pub reconnect_interval: Option<u64>,
}

impl DmxConfig {
    /// Creates a configuration for the serial device at `path`.
    #[must_use]
    pub fn new(alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            scenes: Vec::new(),
            non_blackout_channels: Vec::new(),
            reconnect_interval: None,
        }
    }

    /// Adds a scene.
    #[must_use]
    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scenes.push(scene);
        self
    }

    /// Sets the channels exempt from blackout.
    #[must_use]
    pub fn with_non_blackout_channels(mut self, channels: impl IntoIterator<Item = u16>) -> Self {
        self.non_blackout_channels = channels.into_iter().collect();
        self
    }

    /// Sets the reconnect interval in milliseconds.
    #[must_use]
    pub fn with_reconnect_interval(mut self, millis: u64) -> Self {
        self.reconnect_interval = Some(millis);
        self
    }

    /// Sets the serial line speed.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Configuration of an Art-Net device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtNetConfig {
    /// Unique device alias.
    pub alias: String,
    /// IP address of the Art-Net node.
    #[serde(default)]
    pub ip: Option<IpAddr>,
    /// Art-Net net (0-127).
    #[serde(default)]
    pub net: u8,
    /// Art-Net sub-net and universe, packed as one byte.
    #[serde(default)]
    pub sub_uni: u8,
    /// UDP port of the node.
    #[serde(default = "default_artnet_port")]
    pub port: u16,
    /// Scene definitions.
    #[serde(default)]
    pub scenes: Vec<SceneConfig>,
    /// Universe channels left untouched by a blackout.
    #[serde(default)]
    pub non_blackout_channels: Vec<u16>,
    /// Reconnect interval in milliseconds.
    #[serde(default)]
    pub reconnect_interval: Option<u64>,
}

impl ArtNetConfig {
    /// Creates a configuration for the node at `ip`, universe 0:0.
    #[must_use]
    pub fn new(alias: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            alias: alias.into(),
            ip: Some(ip),
            net: 0,
            sub_uni: 0,
            port: ARTNET_PORT,
            scenes: Vec::new(),
            non_blackout_channels: Vec::new(),
            reconnect_interval: None,
        }
    }

    /// Sets the Art-Net port address.
    #[must_use]
    pub fn with_address(mut self, net: u8, sub_uni: u8) -> Self {
        self.net = net;
        self.sub_uni = sub_uni;
        self
    }

    /// Sets the node's UDP port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Adds a scene.
    #[must_use]
    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scenes.push(scene);
        self
    }

    /// Sets the channels exempt from blackout.
    #[must_use]
    pub fn with_non_blackout_channels(mut self, channels: impl IntoIterator<Item = u16>) -> Self {
        self.non_blackout_channels = channels.into_iter().collect();
        self
    }

    /// Sets the reconnect interval in milliseconds.
    #[must_use]
    pub fn with_reconnect_interval(mut self, millis: u64) -> Self {
        self.reconnect_interval = Some(millis);
        self
    }
}

/// A scene definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Scene alias.
    #[serde(rename = "scene_alias")]
    pub alias: String,
    /// Scene channel to universe channel mapping.
    #[serde(default)]
    pub channel_map: Vec<ChannelMapConfig>,
}

impl SceneConfig {
    /// Creates a scene without channels.
    #[must_use]
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            channel_map: Vec::new(),
        }
    }

    /// Maps a scene channel id onto a universe channel.
    #[must_use]
    pub fn with_channel(mut self, scene_channel_id: u16, universe_channel_id: u16) -> Self {
        self.channel_map.push(ChannelMapConfig {
            scene_channel_id,
            universe_channel_id,
        });
        self
    }
}

/// One entry of a scene's channel map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapConfig {
    /// Logical id used by commands.
    pub scene_channel_id: u16,
    /// Position in the universe (0-511).
    pub universe_channel_id: u16,
}

/// Applies the minimum to a configured reconnect interval.
#[must_use]
pub fn reconnect_interval(millis: Option<u64>) -> Duration {
    millis
        .map(Duration::from_millis)
        .map_or(DEFAULT_RECONNECT_INTERVAL, |d| {
            d.max(DEFAULT_RECONNECT_INTERVAL)
        })
}

fn build_settings(
    alias: &str,
    scenes: &[SceneConfig],
    non_blackout: &[u16],
    interval: Option<u64>,
) -> Result<DeviceSettings, ConfigError> {
    let mut seen = HashSet::new();
    let scenes = scenes
        .iter()
        .map(|sc| {
            if !seen.insert(sc.alias.as_str()) {
                return Err(ConfigError::DuplicateScene {
                    alias: alias.to_string(),
                    scene: sc.alias.clone(),
                });
            }
            let mut scene = Scene::new(sc.alias.clone());
            for entry in &sc.channel_map {
                if entry.scene_channel_id > ChannelId::MAX.value() {
                    return Err(ConfigError::InvalidSceneChannel {
                        alias: alias.to_string(),
                        scene: sc.alias.clone(),
                        channel: entry.scene_channel_id,
                    });
                }
                let universe_channel = ChannelId::new(entry.universe_channel_id).ok_or_else(|| {
                    ConfigError::InvalidChannel {
                        alias: alias.to_string(),
                        scene: sc.alias.clone(),
                        channel: entry.universe_channel_id,
                    }
                })?;
                scene.insert(entry.scene_channel_id, universe_channel, 0);
            }
            Ok(scene)
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(DeviceSettings::new(alias)
        .with_scenes(scenes)
        .with_non_blackout_channels(non_blackout.iter().copied().collect::<NonBlackoutChannels>())
        .with_reconnect_interval(reconnect_interval(interval)))
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_artnet_port() -> u16 {
    ARTNET_PORT
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20))
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{
            "dmx_devices": [{
                "alias": "stage",
                "path": "/dev/ttyUSB0",
                "reconnect_interval": 5000,
                "scenes": [{
                    "scene_alias": "day",
                    "channel_map": [{"scene_channel_id": 1, "universe_channel_id": 10}]
                }]
            }],
            "artnet_devices": [{"alias": "hall", "ip": "10.0.0.20", "net": 1, "sub_uni": 2}]
        }"#;

        let config = UserConfig::from_json_str(json).unwrap();
        let dmx = &config.dmx_devices[0];
        assert_eq!(dmx.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(dmx.reconnect_interval, Some(5000));
        assert_eq!(dmx.scenes[0].channel_map[0].universe_channel_id, 10);

        let artnet = &config.artnet_devices[0];
        assert_eq!(artnet.ip, Some(ip()));
        assert_eq!((artnet.net, artnet.sub_uni, artnet.port), (1, 2, ARTNET_PORT));
    }

    #[test]
    fn empty_document_is_empty_config() {
        let config = UserConfig::from_yaml_str("{}").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn duplicate_alias_across_kinds_is_rejected() {
        let config = UserConfig {
            dmx_devices: vec![DmxConfig::new("main", "/dev/ttyUSB0")],
            artnet_devices: vec![ArtNetConfig::new("main", ip())],
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateAlias(alias)) if alias == "main"
        ));
    }

    #[test]
    fn missing_fields_are_reported_with_index() {
        let config = UserConfig {
            dmx_devices: vec![DmxConfig::new("ok", "/dev/ttyUSB0"), DmxConfig::new("", "/x")],
            artnet_devices: Vec::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { index: 1, field: "alias" })
        ));

        let config = UserConfig {
            dmx_devices: vec![DmxConfig::new("stage", "")],
            artnet_devices: Vec::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { index: 0, field: "path" })
        ));

        let mut artnet = ArtNetConfig::new("hall", ip());
        artnet.ip = None;
        let config = UserConfig {
            dmx_devices: Vec::new(),
            artnet_devices: vec![artnet],
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { index: 0, field: "ip" })
        ));
    }

    #[test]
    fn out_of_range_scene_channel_is_rejected() {
        let config = UserConfig {
            dmx_devices: vec![
                DmxConfig::new("stage", "/dev/ttyUSB0")
                    .with_scene(SceneConfig::new("day").with_channel(1, 512)),
            ],
            artnet_devices: Vec::new(),
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChannel { channel: 512, .. })
        ));
    }

    #[test]
    fn scene_channel_id_must_fit_cache_records() {
        let stage = |scene_channel| {
            DeviceConfig::Dmx(
                DmxConfig::new("stage", "/dev/ttyUSB0")
                    .with_scene(SceneConfig::new("day").with_channel(scene_channel, 10)),
            )
        };

        assert!(stage(511).settings().is_ok());
        for channel in [512, 600, 1000] {
            assert!(matches!(
                stage(channel).settings(),
                Err(ConfigError::InvalidSceneChannel { channel: c, .. }) if c == channel
            ));
        }
    }

    #[test]
    fn duplicate_scene_alias_is_rejected() {
        let config = UserConfig {
            dmx_devices: Vec::new(),
            artnet_devices: vec![
                ArtNetConfig::new("hall", ip())
                    .with_scene(SceneConfig::new("show").with_channel(1, 1))
                    .with_scene(SceneConfig::new("show").with_channel(2, 2)),
            ],
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateScene { alias, scene }) if alias == "hall" && scene == "show"
        ));
    }

    #[test]
    fn validate_entries_keeps_good_entries() {
        let config = UserConfig {
            dmx_devices: vec![
                DmxConfig::new("stage", "/dev/ttyUSB0"),
                DmxConfig::new("", "/dev/ttyUSB1"),
                DmxConfig::new("stage", "/dev/ttyUSB2"),
            ],
            artnet_devices: vec![ArtNetConfig::new("hall", ip())],
        };

        let (valid, errors) = config.validate_entries();
        let aliases: Vec<&str> = valid.iter().map(DeviceConfig::alias).collect();
        assert_eq!(aliases, ["stage", "hall"]);
        assert_eq!(errors.len(), 2);

        // first occurrence wins
        assert!(matches!(&valid[0], DeviceConfig::Dmx(c) if c.path == "/dev/ttyUSB0"));
    }

    #[test]
    fn reconnect_interval_is_floored() {
        assert_eq!(reconnect_interval(None), DEFAULT_RECONNECT_INTERVAL);
        assert_eq!(reconnect_interval(Some(10)), DEFAULT_RECONNECT_INTERVAL);
        assert_eq!(reconnect_interval(Some(2500)), Duration::from_millis(2500));
    }

    #[test]
    fn settings_build_scenes_in_order() {
        let config = DeviceConfig::Dmx(
            DmxConfig::new("stage", "/dev/ttyUSB0")
                .with_scene(SceneConfig::new("day").with_channel(1, 10))
                .with_scene(SceneConfig::new("night").with_channel(1, 11))
                .with_non_blackout_channels([0, 1])
                .with_reconnect_interval(3000),
        );

        let settings = config.settings().unwrap();
        assert_eq!(settings.alias, "stage");
        let names: Vec<&str> = settings.scenes.iter().map(Scene::alias).collect();
        assert_eq!(names, ["day", "night"]);
        assert_eq!(settings.non_blackout_channels.len(), 2);
        assert_eq!(settings.reconnect_interval, Duration::from_secs(3));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(matches!(
            UserConfig::from_path("devices.toml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn from_path_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.yml");
        std::fs::write(&path, "dmx_devices:\n  - alias: stage\n    path: /dev/ttyUSB0\n").unwrap();

        let config = UserConfig::from_path(&path).unwrap();
        assert_eq!(config.dmx_devices[0].alias, "stage");
    }
}
