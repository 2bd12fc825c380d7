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

//! Error types for the serial link.

use thiserror::Error;

/// Failure talking to the OBD-II adapter.
#[derive(Error, Debug)]
pub enum ConnError {
    /// The RFCOMM stream could not be opened.
    #[error("Adapter unreachable: {0}")]
    Unreachable(String),

    /// The stored address is not a valid Bluetooth address.
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// The stream closed before the `>` prompt arrived.
    #[error("Connection dropped before prompt")]
    Dropped,

    /// Read or write failed on an open stream.
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}
