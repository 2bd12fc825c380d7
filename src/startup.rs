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

//! Startup sequencing.
//!
//! Before any connection attempt the coordinator makes sure that a Bluetooth
//! adapter exists, that it is switched on, and that an OBD-II adapter has been
//! chosen. Unmet preconditions put up a notice and block the worker thread on
//! an [`EventChannel`] until the UI layer reports that the user acted.

use std::sync::Arc;
use tracing::{info, warn};

use crate::events::{EventChannel, HandoffMode, PendingEvent, Wait};
use crate::notify::{Notification, NotificationId, NotificationPort};
use crate::state::AgentState;
use crate::storage::{DeviceAddress, KeyValueStore, KEY_MAC_ADDRESS};

/// Platform Bluetooth adapter status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    /// No adapter, or Bluetooth is not supported at all.
    Missing,
    /// Adapter present but powered off.
    Disabled,
    /// Adapter present and powered.
    Enabled,
}

/// Reports the local adapter status.
pub trait AdapterProbe {
    fn probe(&self) -> AdapterStatus;
}

/// How startup ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Preconditions met; connect to this adapter.
    Ready(DeviceAddress),
    /// No Bluetooth adapter. The service stays idle.
    Unsupported,
}

/// Channels the UI layer writes to.
pub struct Signals {
    /// One-shot "Bluetooth is on" hand-off.
    pub bt_enabled: EventChannel<PendingEvent>,
    /// Device selection, latest value wins.
    pub address: EventChannel<PendingEvent>,
}

impl Signals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bt_enabled: EventChannel::new(HandoffMode::Rendezvous),
            address: EventChannel::new(HandoffMode::Latest),
        })
    }

    fn channel(&self, wait: Wait) -> &EventChannel<PendingEvent> {
        match wait {
            Wait::BtEnable => &self.bt_enabled,
            Wait::Address => &self.address,
        }
    }
}

/// Walks through the startup preconditions.
pub struct StartupCoordinator<'a> {
    probe: &'a dyn AdapterProbe,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn NotificationPort>,
    signals: Arc<Signals>,
    state: Arc<AgentState>,
}

impl<'a> StartupCoordinator<'a> {
    pub fn new(
        probe: &'a dyn AdapterProbe,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationPort>,
        signals: Arc<Signals>,
        state: Arc<AgentState>,
    ) -> Self {
        Self {
            probe,
            store,
            notifier,
            signals,
            state,
        }
    }

    /// Run the sequence. Blocks the calling thread while a precondition is unmet.
    pub fn run(&self) -> StartupOutcome {
        match self.probe.probe() {
            AdapterStatus::Missing => {
                warn!("No Bluetooth adapter available, staying idle");
                self.notifier
                    .display(&Notification::precondition(NotificationId::UnsupportedDev));
                self.state.set_unsupported();
                return StartupOutcome::Unsupported;
            }
            AdapterStatus::Disabled => {
                info!("Bluetooth is off, waiting for it to be enabled");
                self.notifier
                    .display(&Notification::precondition(NotificationId::EnableBt));
                self.wait_on(Wait::BtEnable);
                self.notifier.cancel(NotificationId::EnableBt);
                info!("Bluetooth enabled");
            }
            AdapterStatus::Enabled => {}
        }

        let address = match self.store.get(KEY_MAC_ADDRESS) {
            Some(stored) => DeviceAddress::new(stored),
            None => {
                info!("No OBD-II adapter selected, waiting for a choice");
                self.notifier
                    .display(&Notification::precondition(NotificationId::SelectBt));
                let address = self.wait_for_address();
                if let Err(e) = self.store.set(KEY_MAC_ADDRESS, address.as_str()) {
                    warn!("Failed to persist device address: {}", e);
                }
                self.notifier.cancel(NotificationId::SelectBt);
                address
            }
        };

        info!("Startup complete, using adapter {}", address);
        StartupOutcome::Ready(address)
    }

    fn wait_for_address(&self) -> DeviceAddress {
        loop {
            match self.wait_on(Wait::Address) {
                PendingEvent::AddressSelected(address) => return address,
                other => warn!("Ignoring {:?} while waiting for an address", other),
            }
        }
    }

    /// Block until the UI layer signals `wait`.
    fn wait_on(&self, wait: Wait) -> PendingEvent {
        self.state.set_waiting_on(Some(wait));
        let event = self.signals.channel(wait).read();
        self.state.set_waiting_on(None);
        event
    }
}
