// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Transport, TransportFactory};
use crate::config::{ArtNetConfig, DmxConfig};
use crate::error::TransportError;
use crate::types::Universe;

#[derive(Debug)]
struct MockState {
    connect_fails: bool,
    push_fails: bool,
    push_delay: Option<Duration>,
    probe_result: bool,
    probe_hangs: bool,
    open: bool,
    connects: usize,
    probes: usize,
    closes: usize,
    frames: Vec<Universe>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connect_fails: false,
            push_fails: false,
            push_delay: None,
            probe_result: true,
            probe_hangs: false,
            open: false,
            connects: 0,
            probes: 0,
            closes: 0,
            frames: Vec::new(),
        }
    }
}

/// Records pushed frames. Clones share state, so a test keeps one clone as a
/// handle while the device owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_connect_fails(&self, fails: bool) {
        self.state.lock().connect_fails = fails;
    }

    pub(crate) fn set_push_fails(&self, fails: bool) {
        self.state.lock().push_fails = fails;
    }

    /// Makes every later push wait `delay` before completing.
    pub(crate) fn set_push_delay(&self, delay: Duration) {
        self.state.lock().push_delay = Some(delay);
    }

    pub(crate) fn set_probe_result(&self, alive: bool) {
        self.state.lock().probe_result = alive;
    }

    /// Makes every later probe wait forever.
    pub(crate) fn set_probe_hangs(&self, hangs: bool) {
        self.state.lock().probe_hangs = hangs;
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.state.lock().probes
    }

    pub(crate) fn frames(&self) -> Vec<Universe> {
        self.state.lock().frames.clone()
    }

    pub(crate) fn last_frame(&self) -> Option<Universe> {
        self.state.lock().frames.last().cloned()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.connect_fails {
            return Err(TransportError::NotOpen);
        }
        state.open = true;
        Ok(())
    }

    async fn push_frame(&mut self, universe: &Universe) -> Result<(), TransportError> {
        let delay = self.state.lock().push_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.push_fails {
            return Err(TransportError::Io(std::io::Error::other("mock push failure")));
        }
        state.frames.push(universe.clone());
        Ok(())
    }

    async fn probe(&mut self) -> bool {
        let (hangs, alive) = {
            let mut state = self.state.lock();
            state.probes += 1;
            (state.probe_hangs, state.open && state.probe_result)
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        alive
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Factory handing out one [`MockTransport`] per alias.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockFactory {
    transports: Arc<Mutex<HashMap<String, MockTransport>>>,
    created: Arc<Mutex<Vec<String>>>,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the transport most recently built for `alias`.
    pub(crate) fn transport(&self, alias: &str) -> Option<MockTransport> {
        self.transports.lock().get(alias).cloned()
    }

    /// Aliases in construction order, repeated on every rebuild.
    pub(crate) fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    fn build(&self, alias: &str) -> MockTransport {
        let transport = MockTransport::new();
        self.transports
            .lock()
            .insert(alias.to_string(), transport.clone());
        self.created.lock().push(alias.to_string());
        transport
    }
}

impl TransportFactory for MockFactory {
    type Dmx = MockTransport;
    type ArtNet = MockTransport;

    fn dmx(&self, config: &DmxConfig) -> MockTransport {
        self.build(&config.alias)
    }

    fn artnet(&self, config: &ArtNetConfig) -> MockTransport {
        self.build(&config.alias)
    }
}
