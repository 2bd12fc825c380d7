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

//! Background service lifecycle.
//!
//! A service owns one long-lived worker thread. The thread runs startup
//! first and then hands the adapter address to the connection supervisor,
//! which keeps running until the process exits.

use anyhow::Result;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info};

use crate::bluetooth::{BluezProbe, Connector, RfcommConnector, SerialLink};
use crate::config::Config;
use crate::events::PendingEvent;
use crate::location::LocationPort;
use crate::notify::NotificationPort;
use crate::poller::FuelPoller;
use crate::startup::{AdapterProbe, Signals, StartupCoordinator, StartupOutcome};
use crate::state::AgentState;
use crate::storage::{DeviceAddress, KeyValueStore};
use crate::supervisor::{ConnectionSupervisor, RetryPolicy};

/// External collaborators the service talks to.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn NotificationPort>,
    pub location: Arc<dyn LocationPort>,
}

/// Handle used by the UI layer to talk to a running service.
#[derive(Clone)]
pub struct ServiceHandle {
    signals: Arc<Signals>,
    state: Arc<AgentState>,
}

impl ServiceHandle {
    pub fn state(&self) -> &Arc<AgentState> {
        &self.state
    }

    /// Report that Bluetooth was switched on.
    ///
    /// The hand-off blocks until startup consumes it, so it happens on a
    /// short-lived thread of its own.
    pub fn notify_bluetooth_enabled(&self) -> JoinHandle<()> {
        let signals = self.signals.clone();
        thread::spawn(move || signals.bt_enabled.write(PendingEvent::AdapterEnabled))
    }

    /// Report the adapter the user picked.
    pub fn notify_address_selected(&self, address: DeviceAddress) -> JoinHandle<()> {
        let signals = self.signals.clone();
        thread::spawn(move || {
            signals
                .address
                .write(PendingEvent::AddressSelected(address))
        })
    }
}

/// Entry point for starting the background service.
pub struct Service;

impl Service {
    /// Start against BlueZ and the RFCOMM transport.
    pub fn start(config: &Config, ports: Ports) -> Result<ServiceHandle> {
        let connector = RfcommConnector::new(config.obd.rfcomm_channel)
            .with_service_lookup(config.obd.service_lookup);
        let policy = RetryPolicy::from(&config.obd);
        Self::spawn(ports, connector, policy, BluezProbe::new)
    }

    /// Start with an explicit transport and adapter probe.
    pub fn spawn<C, P, F>(
        ports: Ports,
        connector: C,
        policy: RetryPolicy,
        make_probe: F,
    ) -> Result<ServiceHandle>
    where
        C: Connector + Send + 'static,
        P: AdapterProbe,
        F: FnOnce(Arc<Runtime>) -> P + Send + 'static,
    {
        let signals = Signals::new();
        let state = AgentState::new();
        let handle = ServiceHandle {
            signals: signals.clone(),
            state: state.clone(),
        };

        thread::Builder::new()
            .name("fuelwatch-worker".to_string())
            .spawn(move || {
                let rt = match Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => Arc::new(rt),
                    Err(e) => {
                        error!("Failed to build worker runtime: {}", e);
                        return;
                    }
                };

                let probe = make_probe(rt.clone());
                let coordinator = StartupCoordinator::new(
                    &probe,
                    ports.store.clone(),
                    ports.notifier.clone(),
                    signals,
                    state.clone(),
                );

                let address = match coordinator.run() {
                    StartupOutcome::Ready(address) => address,
                    StartupOutcome::Unsupported => {
                        info!("Service idle: Bluetooth not supported");
                        return;
                    }
                };

                let poller = FuelPoller::new(
                    ports.store,
                    ports.notifier,
                    ports.location,
                    state.clone(),
                );
                let mut supervisor =
                    ConnectionSupervisor::new(SerialLink::new(connector), poller, policy, state);
                supervisor.start(address);
                rt.block_on(supervisor.run());
            })?;

        info!("Service worker started");
        Ok(handle)
    }
}
