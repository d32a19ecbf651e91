// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DMX512 universe and channel addressing.

use std::collections::BTreeSet;
use std::fmt;

/// Number of channels in one DMX512 universe.
pub const UNIVERSE_SIZE: usize = 512;

/// Index of a slot inside a universe (0-511).
///
/// # Examples
///
/// ```
/// use dmx_executor::types::ChannelId;
///
/// let ch = ChannelId::new(10).unwrap();
/// assert_eq!(ch.value(), 10);
///
/// assert!(ChannelId::new(512).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u16);

impl ChannelId {
    /// First channel of the universe.
    pub const MIN: Self = Self(0);

    /// Last channel of the universe.
    #[allow(clippy::cast_possible_truncation)]
    pub const MAX: Self = Self(UNIVERSE_SIZE as u16 - 1);

    /// Creates a channel id, returning `None` if it is outside 0-511.
    #[must_use]
    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the raw channel index.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the channel index as an array offset.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for ChannelId {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(value)
    }
}

/// Full 512-slot output state of one device.
///
/// # Examples
///
/// ```
/// use dmx_executor::types::{ChannelId, Universe};
///
/// let mut universe = Universe::new();
/// let ch = ChannelId::new(10).unwrap();
/// universe.set(ch, 200);
/// assert_eq!(universe.get(ch), 200);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Universe([u8; UNIVERSE_SIZE]);

impl Universe {
    /// Creates an all-zero universe.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; UNIVERSE_SIZE])
    }

    /// Creates a universe from raw channel values.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; UNIVERSE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the value of a channel.
    #[must_use]
    pub fn get(&self, channel: ChannelId) -> u8 {
        self.0[channel.index()]
    }

    /// Sets the value of a channel.
    pub fn set(&mut self, channel: ChannelId, value: u8) {
        self.0[channel.index()] = value;
    }

    /// Returns the raw frame.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; UNIVERSE_SIZE] {
        &self.0
    }

    /// Zeroes every channel except the exempt ones.
    pub fn blackout(&mut self, exempt: &NonBlackoutChannels) {
        for (idx, value) in self.0.iter_mut().enumerate() {
            if !exempt.contains_index(idx) {
                *value = 0;
            }
        }
    }

    /// Returns `true` if every channel is zero.
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.0.iter().all(|v| *v == 0)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only lit channels, a full dump is unreadable
        let lit: Vec<(usize, u8)> = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(i, v)| (i, *v))
            .collect();
        f.debug_struct("Universe").field("lit", &lit).finish()
    }
}

impl From<[u8; UNIVERSE_SIZE]> for Universe {
    fn from(bytes: [u8; UNIVERSE_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Universe channels left untouched by a blackout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonBlackoutChannels(BTreeSet<u16>);

impl NonBlackoutChannels {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the channel is exempt from blackout.
    #[must_use]
    pub fn contains(&self, channel: ChannelId) -> bool {
        self.0.contains(&channel.value())
    }

    fn contains_index(&self, idx: usize) -> bool {
        u16::try_from(idx).is_ok_and(|i| self.0.contains(&i))
    }

    /// Returns the number of exempt channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no channel is exempt.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u16> for NonBlackoutChannels {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
