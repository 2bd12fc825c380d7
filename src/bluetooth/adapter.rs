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

//! BlueZ adapter access.

use anyhow::Result;
use bluer::{AdapterEvent, AdapterProperty, Address, Session};
use futures::{pin_mut, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::events::Wait;
use crate::service::ServiceHandle;
use crate::startup::{AdapterProbe, AdapterStatus};

/// How often the watcher re-checks power while startup is blocked.
const POWER_RECHECK: Duration = Duration::from_secs(2);

/// Probes the default BlueZ adapter from the worker thread.
pub struct BluezProbe {
    rt: Arc<Runtime>,
}

impl BluezProbe {
    pub fn new(rt: Arc<Runtime>) -> Self {
        Self { rt }
    }
}

impl AdapterProbe for BluezProbe {
    fn probe(&self) -> AdapterStatus {
        self.rt.block_on(async {
            let session = match Session::new().await {
                Ok(session) => session,
                Err(e) => {
                    warn!("BlueZ session unavailable: {}", e);
                    return AdapterStatus::Missing;
                }
            };

            let adapter = match session.default_adapter().await {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!("No default Bluetooth adapter: {}", e);
                    return AdapterStatus::Missing;
                }
            };
            info!("Using Bluetooth adapter: {}", adapter.name());

            match adapter.is_powered().await {
                Ok(true) => AdapterStatus::Enabled,
                Ok(false) => AdapterStatus::Disabled,
                Err(e) => {
                    warn!("Could not read adapter power state: {}", e);
                    AdapterStatus::Missing
                }
            }
        })
    }
}

/// A paired Bluetooth device.
#[derive(Debug, Clone)]
pub struct PairedDevice {
    pub address: Address,
    pub name: String,
}

/// List devices paired with the default adapter.
pub async fn paired_devices() -> Result<Vec<PairedDevice>> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    let mut devices = Vec::new();

    for addr in adapter.device_addresses().await? {
        let device = adapter.device(addr)?;
        if device.is_paired().await? {
            let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
            devices.push(PairedDevice {
                address: addr,
                name,
            });
        }
    }

    Ok(devices)
}

/// Tell the service when the adapter is switched on.
///
/// Only signals while startup is blocked waiting for Bluetooth, and only
/// once per wait.
pub async fn watch_power(handle: ServiceHandle) -> Result<()> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    let events = adapter.events().await?;
    pin_mut!(events);

    let mut recheck = tokio::time::interval(POWER_RECHECK);
    let mut signalled = false;

    loop {
        let powered = tokio::select! {
            event = events.next() => match event {
                Some(AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered))) => powered,
                Some(_) => continue,
                None => break,
            },
            _ = recheck.tick() => adapter.is_powered().await.unwrap_or(false),
        };

        let waiting = handle.state().get_waiting_on() == Some(Wait::BtEnable);
        if !waiting {
            signalled = false;
            continue;
        }
        if powered && !signalled {
            info!("Adapter {} powered on", adapter.name());
            handle.notify_bluetooth_enabled();
            signalled = true;
        } else {
            debug!("Still waiting for adapter power");
        }
    }

    Ok(())
}
