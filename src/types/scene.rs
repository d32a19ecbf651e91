// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scenes map small logical channel ids onto universe positions.

use std::collections::BTreeMap;

use super::{ChannelId, Universe};

/// One slot of a scene: a universe position plus its last saved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// Position of the slot in the universe.
    pub universe_channel: ChannelId,
    /// Last saved value of the slot.
    pub value: u8,
}

impl Channel {
    /// Creates a channel slot.
    #[must_use]
    pub const fn new(universe_channel: ChannelId, value: u8) -> Self {
        Self {
            universe_channel,
            value,
        }
    }
}

/// A named view translating scene channel ids into universe channels.
///
/// # Examples
///
/// ```
/// use dmx_executor::types::{ChannelId, Scene, Universe};
///
/// let mut scene = Scene::new("day");
/// scene.insert(1, ChannelId::new(10).unwrap(), 0);
///
/// let mut universe = Universe::new();
/// universe.set(ChannelId::new(10).unwrap(), 200);
/// scene.capture(&universe);
///
/// assert_eq!(scene.channel(1).unwrap().value, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    alias: String,
    channels: BTreeMap<u16, Channel>,
}

impl Scene {
    /// Creates a scene with an empty channel map.
    #[must_use]
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            channels: BTreeMap::new(),
        }
    }

    /// Returns the scene alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Adds or replaces the slot for a scene channel id.
    pub fn insert(&mut self, scene_channel: u16, universe_channel: ChannelId, value: u8) {
        self.channels
            .insert(scene_channel, Channel::new(universe_channel, value));
    }

    /// Looks up the slot for a scene channel id.
    #[must_use]
    pub fn channel(&self, scene_channel: u16) -> Option<&Channel> {
        self.channels.get(&scene_channel)
    }

    /// Iterates over `(scene channel id, slot)` pairs in ascending id order.
    pub fn channels(&self) -> impl Iterator<Item = (u16, &Channel)> {
        self.channels.iter().map(|(id, ch)| (*id, ch))
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the scene has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns `true` if `other` has the same scene channel ids, each mapped
    /// to the same universe channel. Values are not compared.
    #[must_use]
    pub fn matches_layout(&self, other: &Scene) -> bool {
        self.channels.len() == other.channels.len()
            && self.channels.iter().all(|(id, ch)| {
                other
                    .channels
                    .get(id)
                    .is_some_and(|o| o.universe_channel == ch.universe_channel)
            })
    }

    /// Writes every slot's saved value into the universe.
    pub fn apply(&self, universe: &mut Universe) {
        for ch in self.channels.values() {
            universe.set(ch.universe_channel, ch.value);
        }
    }

    /// Overwrites every slot's saved value with the universe's current value.
    pub fn capture(&mut self, universe: &Universe) {
        for ch in self.channels.values_mut() {
            ch.value = universe.get(ch.universe_channel);
        }
    }
}
