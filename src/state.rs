// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Observable agent state.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::events::Wait;

/// Lifecycle of the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed(_) => "Failed",
        }
    }
}

/// Result of one fuel query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelReading {
    /// Fuel level in percent.
    Level(u32),
    /// The reply tail was not a number.
    Unparseable,
}

/// A reading with the time it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSample {
    pub reading: FuelReading,
    pub taken_at: DateTime<Local>,
}

impl PollSample {
    pub fn now(reading: FuelReading) -> Self {
        Self {
            reading,
            taken_at: Local::now(),
        }
    }
}

/// Shared agent state.
#[derive(Debug)]
pub struct AgentState {
    /// Current link state.
    pub connection: RwLock<ConnectionState>,

    /// Address the supervisor is connecting to.
    pub device: RwLock<Option<String>>,

    /// Most recent poll result.
    pub last_sample: RwLock<Option<PollSample>>,

    /// Whether startup gave up because there is no adapter.
    pub unsupported: RwLock<bool>,

    /// Precondition startup is currently blocked on.
    pub waiting_on: RwLock<Option<Wait>>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            connection: RwLock::new(ConnectionState::Disconnected),
            device: RwLock::new(None),
            last_sample: RwLock::new(None),
            unsupported: RwLock::new(false),
            waiting_on: RwLock::new(None),
        }
    }
}

impl AgentState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connecting(&self, device: &str) {
        *self.connection.write() = ConnectionState::Connecting;
        *self.device.write() = Some(device.to_string());
    }

    pub fn set_connected(&self) {
        *self.connection.write() = ConnectionState::Connected;
    }

    pub fn set_disconnected(&self) {
        *self.connection.write() = ConnectionState::Disconnected;
    }

    pub fn set_failed(&self, reason: String) {
        *self.connection.write() = ConnectionState::Failed(reason);
    }

    pub fn set_unsupported(&self) {
        *self.unsupported.write() = true;
    }

    pub fn is_unsupported(&self) -> bool {
        *self.unsupported.read()
    }

    pub fn set_waiting_on(&self, wait: Option<Wait>) {
        *self.waiting_on.write() = wait;
    }

    pub fn get_waiting_on(&self) -> Option<Wait> {
        *self.waiting_on.read()
    }

    pub fn get_connection(&self) -> ConnectionState {
        self.connection.read().clone()
    }

    pub fn get_device(&self) -> Option<String> {
        self.device.read().clone()
    }

    pub fn record_sample(&self, sample: PollSample) {
        *self.last_sample.write() = Some(sample);
    }

    pub fn get_last_sample(&self) -> Option<PollSample> {
        *self.last_sample.read()
    }
}
