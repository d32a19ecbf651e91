// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lighting data model.
//!
//! A device owns one [`Universe`] of 512 byte-sized channels. [`Scene`]s give
//! commands a small logical address space: each scene channel id resolves to
//! a [`ChannelId`] inside the universe plus the last value saved for it.

mod scene;
mod universe;

pub use scene::{Channel, Scene};
pub use universe::{ChannelId, NonBlackoutChannels, UNIVERSE_SIZE, Universe};
