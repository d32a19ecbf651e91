// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use dmx_executor::config::{ArtNetConfig, DmxConfig};
use dmx_executor::error::TransportError;
use dmx_executor::transport::{Transport, TransportFactory};
use dmx_executor::types::Universe;

#[derive(Debug)]
struct State {
    reachable: bool,
    open: bool,
    frames: Vec<Universe>,
}

/// Transport that records every frame it is handed.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                reachable: true,
                open: false,
                frames: Vec::new(),
            })),
        }
    }

    /// Makes the device reachable or not. An unreachable device fails
    /// connects and probes.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn last_frame(&self) -> Option<Universe> {
        self.state.lock().frames.last().cloned()
    }
}

impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.reachable {
            return Err(TransportError::NotOpen);
        }
        state.open = true;
        Ok(())
    }

    async fn push_frame(&mut self, universe: &Universe) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open || !state.reachable {
            return Err(TransportError::NotOpen);
        }
        state.frames.push(universe.clone());
        Ok(())
    }

    async fn probe(&mut self) -> bool {
        let state = self.state.lock();
        state.open && state.reachable
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

/// Factory keeping a handle on the latest transport of each alias.
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    transports: Arc<Mutex<HashMap<String, FakeTransport>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self, alias: &str) -> FakeTransport {
        self.transports
            .lock()
            .get(alias)
            .cloned()
            .unwrap_or_else(|| panic!("no transport built for '{alias}'"))
    }

    fn build(&self, alias: &str) -> FakeTransport {
        let transport = FakeTransport::new();
        self.transports
            .lock()
            .insert(alias.to_string(), transport.clone());
        transport
    }
}

impl TransportFactory for FakeFactory {
    type Dmx = FakeTransport;
    type ArtNet = FakeTransport;

    fn dmx(&self, config: &DmxConfig) -> FakeTransport {
        self.build(&config.alias)
    }

    fn artnet(&self, config: &ArtNetConfig) -> FakeTransport {
        self.build(&config.alias)
    }
}

/// Lets background reconnect loops run under paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
