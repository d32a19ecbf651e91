// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run-length codec used to persist universes and scenes in the cache.
//!
//! Both formats are a concatenation of 9-character records made of three
//! zero-padded 3-digit decimal fields, with no separators.
//!
//! # Universe records
//!
//! `FFFLLLVVV`: a run of channels `FFF..=LLL` (inclusive) all holding value
//! `VVV`. Runs must start at channel 0, follow each other without gaps or
//! overlaps and end at channel 511.
//!
//! ```
//! use dmx_executor::codec::{decode_universe, encode_universe};
//! use dmx_executor::types::{ChannelId, Universe};
//!
//! let mut universe = Universe::new();
//! universe.set(ChannelId::new(10).unwrap(), 200);
//!
//! let encoded = encode_universe(&universe);
//! assert_eq!(encoded, "000009000010010200011511000");
//! assert_eq!(decode_universe(&encoded).unwrap(), universe);
//! ```
//!
//! # Scene records
//!
//! `SSSUUUVVV`: scene channel id, universe channel id and saved value.
//! Record order carries no meaning.

use crate::error::DecodeError;
use crate::types::{ChannelId, Scene, UNIVERSE_SIZE, Universe};

/// Length of one encoded record.
pub const RECORD_LEN: usize = 9;

const FIELD_LEN: usize = 3;
const MAX_CHANNEL: u16 = ChannelId::MAX.value();
const MAX_VALUE: u16 = u8::MAX as u16;

/// Encodes a universe as a sequence of run-length records.
#[must_use]
pub fn encode_universe(universe: &Universe) -> String {
    let bytes = universe.as_bytes();
    let mut out = String::with_capacity(RECORD_LEN * 4);
    let mut start = 0;

    for idx in 1..=UNIVERSE_SIZE {
        if idx == UNIVERSE_SIZE || bytes[idx] != bytes[start] {
            push_record(&mut out, start, idx - 1, usize::from(bytes[start]));
            start = idx;
        }
    }

    out
}

/// Decodes a universe from run-length records.
///
/// Decoding is all-or-nothing: the universe is only returned once every
/// record has been validated.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the string is not a whole number of records,
/// a field is not numeric or out of range, a run is inverted, runs are not
/// contiguous from channel 0, or they stop before channel 511.
pub fn decode_universe(encoded: &str) -> Result<Universe, DecodeError> {
    let bytes = encoded.as_bytes();
    if bytes.is_empty() || bytes.len() % RECORD_LEN != 0 {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }

    let mut frame = [0u8; UNIVERSE_SIZE];
    let mut next: u16 = 0;

    for (n, record) in bytes.chunks_exact(RECORD_LEN).enumerate() {
        let offset = n * RECORD_LEN;
        let first = parse_field(record, 0, offset, "first channel", MAX_CHANNEL)?;
        let last = parse_field(record, 1, offset, "last channel", MAX_CHANNEL)?;
        let value = parse_field(record, 2, offset, "value", MAX_VALUE)?;

        if first > last {
            return Err(DecodeError::InvertedRun { first, last });
        }
        if first != next {
            return Err(DecodeError::NonContiguous {
                expected: next,
                actual: first,
            });
        }

        // value <= 255 was checked above
        #[allow(clippy::cast_possible_truncation)]
        frame[usize::from(first)..=usize::from(last)].fill(value as u8);
        next = last + 1;
    }

    if usize::from(next) != UNIVERSE_SIZE {
        return Err(DecodeError::IncompleteUniverse {
            covered: usize::from(next),
        });
    }

    Ok(Universe::from_bytes(frame))
}

/// Encodes the channel map of a scene.
#[must_use]
pub fn encode_scene(scene: &Scene) -> String {
    let mut out = String::with_capacity(RECORD_LEN * scene.len());
    for (scene_channel, channel) in scene.channels() {
        push_record(
            &mut out,
            usize::from(scene_channel),
            channel.universe_channel.index(),
            usize::from(channel.value),
        );
    }
    out
}

/// Decodes a scene channel map into a new scene named `alias`.
///
/// An empty string decodes into an empty scene.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the string is not a whole number of records
/// or a field is not numeric or out of range.
pub fn decode_scene(alias: &str, encoded: &str) -> Result<Scene, DecodeError> {
    let bytes = encoded.as_bytes();
    if bytes.len() % RECORD_LEN != 0 {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }

    let mut scene = Scene::new(alias);
    for (n, record) in bytes.chunks_exact(RECORD_LEN).enumerate() {
        let offset = n * RECORD_LEN;
        let scene_channel = parse_field(record, 0, offset, "scene channel", MAX_CHANNEL)?;
        let universe_channel = parse_field(record, 1, offset, "universe channel", MAX_CHANNEL)?;
        let value = parse_field(record, 2, offset, "value", MAX_VALUE)?;

        let universe_channel =
            ChannelId::new(universe_channel).ok_or(DecodeError::OutOfRange {
                field: "universe channel",
                value: universe_channel,
                max: MAX_CHANNEL,
            })?;
        #[allow(clippy::cast_possible_truncation)]
        scene.insert(scene_channel, universe_channel, value as u8);
    }

    Ok(scene)
}

fn push_record(out: &mut String, a: usize, b: usize, c: usize) {
    out.push_str(&format!("{a:03}{b:03}{c:03}"));
}

fn parse_field(
    record: &[u8],
    position: usize,
    offset: usize,
    field: &'static str,
    max: u16,
) -> Result<u16, DecodeError> {
    let start = position * FIELD_LEN;
    let digits = &record[start..start + FIELD_LEN];

    let mut value: u16 = 0;
    for digit in digits {
        if !digit.is_ascii_digit() {
            return Err(DecodeError::NotNumeric { offset, field });
        }
        value = value * 10 + u16::from(digit - b'0');
    }

    if value > max {
        return Err(DecodeError::OutOfRange { field, value, max });
    }
    Ok(value)
}
