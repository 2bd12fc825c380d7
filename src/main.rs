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

//! FuelWatch background agent

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fuelwatch::bluetooth;
use fuelwatch::config::Config;
use fuelwatch::location::FixedLocation;
use fuelwatch::notify::LogNotifier;
use fuelwatch::service::{Ports, Service};
use fuelwatch::storage::{FileStore, KeyValueStore, KEY_LOW_FUEL};
use fuelwatch::ui;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fuelwatch=info".parse()?),
        )
        .init();

    info!("Starting FuelWatch v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    // Initialize storage
    let store = Arc::new(FileStore::new(&config.data_dir)?);
    if store.get(KEY_LOW_FUEL).is_none() {
        store.set(
            KEY_LOW_FUEL,
            &config.obd.default_fuel_threshold.to_string(),
        )?;
    }
    info!("Settings store initialized");

    let ports = Ports {
        store,
        notifier: Arc::new(LogNotifier),
        location: Arc::new(FixedLocation::new(config.location)),
    };
    let handle = Service::start(&config, ports)?;

    // Platform signals
    let power_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = bluetooth::watch_power(power_handle).await {
            error!("Adapter power watcher stopped: {}", e);
        }
    });

    let chooser_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = ui::run_device_chooser(chooser_handle).await {
            error!("Device chooser stopped: {}", e);
        }
    });

    info!("Ready.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let state = handle.state();
    info!(
        "FuelWatch stopped (link to {} was {})",
        state.get_device().as_deref().unwrap_or("no adapter"),
        state.get_connection().as_str()
    );
    Ok(())
}
