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

//! Device chooser on stdin.
//!
//! When startup blocks on device selection, the paired devices are listed
//! and the user types either a list number or a hardware address.

use anyhow::Result;
use bluer::Address;
use std::io::{self, BufRead};
use std::time::Duration;
use tracing::{info, warn};

use crate::bluetooth::{paired_devices, PairedDevice};
use crate::events::Wait;
use crate::service::ServiceHandle;
use crate::storage::DeviceAddress;

const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Resolve one line of user input against the listed devices.
pub fn parse_choice(input: &str, devices: &[PairedDevice]) -> Option<DeviceAddress> {
    let input = input.trim();

    if let Ok(index) = input.parse::<usize>() {
        return devices
            .get(index.checked_sub(1)?)
            .map(|d| DeviceAddress::new(d.address.to_string()));
    }

    input
        .parse::<Address>()
        .ok()
        .map(|addr| DeviceAddress::new(addr.to_string()))
}

/// Result of reading one answer from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Selected(DeviceAddress),
    Invalid(String),
    /// Input is at end of file. No answer will ever come.
    Closed,
}

/// Read one line from `reader` and resolve it.
pub fn read_choice<R: BufRead>(reader: &mut R, devices: &[PairedDevice]) -> io::Result<Choice> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(Choice::Closed);
    }

    Ok(match parse_choice(&line, devices) {
        Some(address) => Choice::Selected(address),
        None => Choice::Invalid(line.trim().to_string()),
    })
}

/// Prompt for a device whenever startup is waiting for one.
///
/// Returns once stdin is closed.
pub async fn run_device_chooser(handle: ServiceHandle) -> Result<()> {
    let mut check = tokio::time::interval(CHECK_INTERVAL);

    loop {
        check.tick().await;
        if handle.state().get_waiting_on() != Some(Wait::Address) {
            continue;
        }

        let devices = match paired_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Could not list paired devices: {}", e);
                Vec::new()
            }
        };

        println!("Select your OBD-II adapter:");
        for (i, device) in devices.iter().enumerate() {
            println!("  {}) {} [{}]", i + 1, device.name, device.address);
        }
        println!("Enter a number or a hardware address:");

        let choice = tokio::task::spawn_blocking(move || {
            read_choice(&mut io::stdin().lock(), &devices)
        })
        .await??;

        match choice {
            Choice::Selected(address) => {
                info!("Adapter {} chosen", address);
                handle.notify_address_selected(address);
                // Let startup pick it up before checking again.
                tokio::time::sleep(CHECK_INTERVAL).await;
                check.reset();
            }
            Choice::Invalid(input) => warn!("Not a valid choice: {:?}", input),
            Choice::Closed => {
                info!("stdin closed, device chooser stopped");
                return Ok(());
            }
        }
    }
}
