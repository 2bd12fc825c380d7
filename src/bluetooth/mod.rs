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

//! Bluetooth communication module.
//!
//! RFCOMM client for the ELM327 OBD-II adapter plus the BlueZ glue the
//! startup sequence needs.

pub mod adapter;
pub mod elm327;
pub mod link;

pub use adapter::{paired_devices, watch_power, BluezProbe, PairedDevice};
pub use link::{Connector, OpenLink, RfcommConnector, SerialLink, RFCOMM_CHANNEL, SPP_UUID};
