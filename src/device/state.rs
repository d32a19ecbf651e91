// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mutable device state guarded by the per-device lock.

use std::sync::Arc;

use super::{ConnectionState, DeviceSettings};
use crate::cache::{Cache, scene_key, universe_key};
use crate::codec::{decode_scene, decode_universe, encode_scene, encode_universe};
use crate::error::{DeviceError, TransportError};
use crate::transport::Transport;
use crate::types::{ChannelId, NonBlackoutChannels, Scene, Universe};

/// Universe, scenes, connection state and transport of one device.
///
/// Everything lives behind one lock so that a command push, a reconnect
/// re-push and a health probe never interleave.
pub(super) struct DeviceCore<T> {
    pub(super) alias: String,
    pub(super) universe: Universe,
    pub(super) scenes: Vec<Scene>,
    pub(super) current_scene: Option<String>,
    pub(super) non_blackout: NonBlackoutChannels,
    pub(super) state: ConnectionState,
    pub(super) transport: T,
    cache: Arc<dyn Cache>,
}

impl<T: Transport> DeviceCore<T> {
    /// Builds the core from settings, overriding defaults with cached state.
    pub(super) fn restore(settings: DeviceSettings, transport: T, cache: Arc<dyn Cache>) -> Self {
        let DeviceSettings {
            alias,
            scenes,
            non_blackout_channels,
            ..
        } = settings;

        let universe = load_universe(&alias, cache.as_ref());
        let scenes: Vec<Scene> = scenes
            .into_iter()
            .map(|configured| load_scene(&alias, configured, cache.as_ref()))
            .collect();
        let current_scene = scenes.first().map(|s| s.alias().to_string());

        Self {
            alias,
            universe,
            scenes,
            current_scene,
            non_blackout: non_blackout_channels,
            state: ConnectionState::Disconnected,
            transport,
            cache,
        }
    }

    pub(super) fn ensure_connected(&self) -> Result<(), DeviceError> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(DeviceError::NoConnection)
        }
    }

    pub(super) fn scene_index(&self, scene_alias: &str) -> Option<usize> {
        self.scenes.iter().position(|s| s.alias() == scene_alias)
    }

    pub(super) fn current_scene_index(&self) -> Result<usize, DeviceError> {
        let current = self
            .current_scene
            .as_deref()
            .ok_or(DeviceError::NoSceneSelected)?;
        self.scene_index(current)
            .ok_or_else(|| DeviceError::UnknownScene(current.to_string()))
    }

    /// Maps a scene channel id of the current scene to its universe channel.
    pub(super) fn resolve_channel(&self, scene_channel: u16) -> Result<ChannelId, DeviceError> {
        let scene = &self.scenes[self.current_scene_index()?];
        scene
            .channel(scene_channel)
            .map(|ch| ch.universe_channel)
            .ok_or_else(|| DeviceError::ChannelNotInScene {
                channel: scene_channel,
                scene: scene.alias().to_string(),
            })
    }

    /// Writes one channel, persists the universe and pushes it.
    pub(super) async fn write_channel(
        &mut self,
        channel: ChannelId,
        value: u8,
    ) -> Result<(), DeviceError> {
        self.universe.set(channel, value);
        self.persist_universe();
        self.push().await
    }

    /// Opens the transport and pushes the whole universe.
    pub(super) async fn connect(&mut self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        if let Err(e) = self.transport.push_frame(&self.universe).await {
            self.transport.close();
            return Err(e);
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Pushes the whole universe, demoting the device if the push fails.
    pub(super) async fn push(&mut self) -> Result<(), DeviceError> {
        match self.transport.push_frame(&self.universe).await {
            Ok(()) => {
                tracing::debug!(device = %self.alias, "Pushed frame");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(device = %self.alias, error = %e, "Frame push failed, device disconnected");
                self.disconnect();
                Err(e.into())
            }
        }
    }

    pub(super) fn disconnect(&mut self) {
        self.transport.close();
        self.state = ConnectionState::Disconnected;
    }

    pub(super) fn persist_universe(&self) {
        let key = universe_key(&self.alias);
        if let Err(e) = self.cache.set(&key, &encode_universe(&self.universe)) {
            tracing::warn!(device = %self.alias, error = %e, "Failed to cache universe");
        }
    }

    pub(super) fn persist_scene(&self, index: usize) {
        let scene = &self.scenes[index];
        let key = scene_key(&self.alias, scene.alias());
        if let Err(e) = self.cache.set(&key, &encode_scene(scene)) {
            tracing::warn!(device = %self.alias, scene = %scene.alias(), error = %e, "Failed to cache scene");
        }
    }
}

fn load_universe(alias: &str, cache: &dyn Cache) -> Universe {
    match cache.get(&universe_key(alias)) {
        Ok(Some(encoded)) => decode_universe(&encoded).unwrap_or_else(|e| {
            tracing::warn!(device = %alias, error = %e, "Cached universe is invalid, starting dark");
            Universe::new()
        }),
        Ok(None) => Universe::new(),
        Err(e) => {
            tracing::warn!(device = %alias, error = %e, "Failed to read cached universe");
            Universe::new()
        }
    }
}

fn load_scene(alias: &str, configured: Scene, cache: &dyn Cache) -> Scene {
    let encoded = match cache.get(&scene_key(alias, configured.alias())) {
        Ok(Some(encoded)) => encoded,
        Ok(None) => return configured,
        Err(e) => {
            tracing::warn!(device = %alias, scene = %configured.alias(), error = %e, "Failed to read cached scene");
            return configured;
        }
    };

    match decode_scene(configured.alias(), &encoded) {
        Ok(cached) if cached.matches_layout(&configured) => cached,
        Ok(_) => {
            tracing::warn!(device = %alias, scene = %configured.alias(), "Cached scene does not match configuration, using configured scene");
            configured
        }
        Err(e) => {
            tracing::warn!(device = %alias, scene = %configured.alias(), error = %e, "Cached scene is invalid, using configured scene");
            configured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::transport::mock::MockTransport;

    fn ch(value: u16) -> ChannelId {
        ChannelId::new(value).unwrap()
    }

    fn day() -> Scene {
        let mut scene = Scene::new("day");
        scene.insert(1, ch(10), 0);
        scene
    }

    fn restore(cache: &Arc<MemoryCache>, scenes: Vec<Scene>) -> DeviceCore<MockTransport> {
        let settings = DeviceSettings::new("stage").with_scenes(scenes);
        DeviceCore::restore(settings, MockTransport::new(), Arc::clone(cache) as Arc<dyn Cache>)
    }

    #[test]
    fn restore_without_cache_uses_defaults() {
        let cache = Arc::new(MemoryCache::new());
        let core = restore(&cache, vec![day(), Scene::new("night")]);

        assert!(core.universe.is_dark());
        assert_eq!(core.current_scene.as_deref(), Some("day"));
        assert_eq!(core.state, ConnectionState::Disconnected);
    }

    #[test]
    fn restore_without_scenes_has_no_current_scene() {
        let cache = Arc::new(MemoryCache::new());
        let core = restore(&cache, Vec::new());
        assert!(core.current_scene.is_none());
        assert!(matches!(
            core.resolve_channel(1),
            Err(DeviceError::NoSceneSelected)
        ));
    }

    #[test]
    fn restore_reads_cached_universe_and_scene() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set("stage_universe", "000009000010010200011511000")
            .unwrap();
        cache.set("stage_scene_day", "001010150").unwrap();

        let core = restore(&cache, vec![day()]);
        assert_eq!(core.universe.get(ch(10)), 200);
        assert_eq!(core.scenes[0].channel(1).unwrap().value, 150);
    }

    #[test]
    fn invalid_cached_universe_falls_back_to_dark() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("stage_universe", "000009200").unwrap();

        let core = restore(&cache, Vec::new());
        assert!(core.universe.is_dark());
    }

    #[test]
    fn cached_scene_with_other_layout_is_discarded() {
        let cache = Arc::new(MemoryCache::new());
        // channel 1 moved to universe channel 11
        cache.set("stage_scene_day", "001011150").unwrap();

        let core = restore(&cache, vec![day()]);
        assert_eq!(core.scenes[0], day());
    }

    #[test]
    fn corrupt_cached_scene_is_discarded() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("stage_scene_day", "garbage").unwrap();

        let core = restore(&cache, vec![day()]);
        assert_eq!(core.scenes[0], day());
    }

    #[test]
    fn resolve_unknown_channel() {
        let cache = Arc::new(MemoryCache::new());
        let core = restore(&cache, vec![day()]);

        assert_eq!(core.resolve_channel(1).unwrap(), ch(10));
        assert!(matches!(
            core.resolve_channel(2),
            Err(DeviceError::ChannelNotInScene { channel: 2, ref scene }) if scene == "day"
        ));
    }

    #[tokio::test]
    async fn failed_connect_push_closes_transport() {
        let cache = Arc::new(MemoryCache::new());
        let mut core = restore(&cache, Vec::new());
        let handle = core.transport.clone();
        handle.set_push_fails(true);

        assert!(core.connect().await.is_err());
        assert_eq!(core.state, ConnectionState::Disconnected);
        assert!(!handle.is_open());
    }
}
