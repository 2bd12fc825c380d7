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

//! ELM327 AT-command session.
//!
//! Every session starts with a fixed init sequence, after which the adapter
//! answers OBD-II mode 01 requests with echo, linefeeds, spaces and headers
//! switched off.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::link::OpenLink;
use crate::error::ConnError;
use crate::state::FuelReading;

/// Init sequence, sent in order on every new session.
pub const INIT_COMMANDS: [&str; 6] = [
    "atz",   // reset
    "ate0",  // echo off
    "atl0",  // linefeeds off
    "ats0",  // spaces off
    "ath0",  // headers off
    "atsp0", // automatic protocol
];

/// Mode 01 PID 0x2F, fuel tank level input.
pub const FUEL_LEVEL_PID: &str = "012F";

/// Run the init sequence. Replies are discarded.
pub async fn init_session<S>(link: &mut OpenLink<S>) -> Result<(), ConnError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for command in INIT_COMMANDS {
        let reply = link.send_command(command).await?;
        debug!("{} -> {:?}", command, reply.trim());
    }
    Ok(())
}

/// Ask the adapter for the fuel level.
pub async fn query_fuel_level<S>(link: &mut OpenLink<S>) -> Result<FuelReading, ConnError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = link.send_command(FUEL_LEVEL_PID).await?;
    Ok(parse_fuel_level(&reply))
}

/// Trim the reply and turn carriage returns into line feeds.
pub fn normalize_reply(raw: &str) -> String {
    raw.trim().replace('\r', "\n")
}

/// Decode the fuel level from a raw reply.
///
/// Only the last two characters are read, as a decimal number. A hex data
/// byte such as `5A` comes out as [`FuelReading::Unparseable`].
pub fn parse_fuel_level(raw: &str) -> FuelReading {
    let normalized = normalize_reply(raw);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < 2 {
        return FuelReading::Unparseable;
    }

    let tail: String = chars[chars.len() - 2..].iter().collect();
    match tail.parse::<u32>() {
        Ok(level) => FuelReading::Level(level),
        Err(_) => FuelReading::Unparseable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[test]
    fn test_normalize_reply() {
        assert_eq!(normalize_reply("  41 2F 5A\r\r"), "41 2F 5A");
        assert_eq!(normalize_reply("SEARCHING...\r412F14\r\r"), "SEARCHING...\n412F14");
    }

    #[test]
    fn test_hex_tail_is_unparseable() {
        assert_eq!(parse_fuel_level("41 2F 5A\r\r"), FuelReading::Unparseable);
    }

    #[test]
    fn test_decimal_tail() {
        assert_eq!(parse_fuel_level("41 2F 14\r\r"), FuelReading::Level(14));
        assert_eq!(parse_fuel_level("412F55\r"), FuelReading::Level(55));
        assert_eq!(parse_fuel_level("SEARCHING...\r412F07\r\r"), FuelReading::Level(7));
    }

    #[test]
    fn test_short_or_error_replies() {
        assert_eq!(parse_fuel_level(""), FuelReading::Unparseable);
        assert_eq!(parse_fuel_level("\r\r"), FuelReading::Unparseable);
        assert_eq!(parse_fuel_level("7"), FuelReading::Unparseable);
        assert_eq!(parse_fuel_level("NO DATA\r\r"), FuelReading::Unparseable);
    }

    #[tokio::test]
    async fn test_init_session_order() {
        let (client, device) = duplex(1024);
        let mut link = OpenLink::new(client);

        let device_task = tokio::spawn(async move {
            let mut device = BufReader::new(device);
            let mut seen = Vec::new();
            for _ in 0..INIT_COMMANDS.len() {
                let mut cmd = Vec::new();
                device.read_until(b'\r', &mut cmd).await.unwrap();
                cmd.pop();
                seen.push(String::from_utf8(cmd).unwrap());
                device.get_mut().write_all(b"OK\r\r>").await.unwrap();
            }
            seen
        });

        init_session(&mut link).await.unwrap();
        assert_eq!(device_task.await.unwrap(), INIT_COMMANDS.to_vec());
    }
}
