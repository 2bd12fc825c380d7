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

//! RFCOMM byte stream to the OBD-II adapter.

use anyhow::anyhow;
use bluer::rfcomm::{Profile, Role, SocketAddr, Stream};
use bluer::{Address, Session};
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ConnError;
use crate::storage::DeviceAddress;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel ELM327 adapters expose SPP on.
pub const RFCOMM_CHANNEL: u8 = 1;

/// ELM327 prompt byte terminating every reply.
pub const PROMPT: u8 = b'>';

/// Upper bound for connecting through the SPP service record.
const SERVICE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a raw byte stream to a device.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    async fn open(&self, address: &DeviceAddress) -> Result<Self::Stream, ConnError>;
}

/// Connects over BlueZ RFCOMM sockets.
///
/// The adapter's SPP service record is tried first. When that fails the
/// connector dials the configured channel directly.
#[derive(Debug, Clone)]
pub struct RfcommConnector {
    channel: u8,
    service_lookup: bool,
}

impl RfcommConnector {
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            service_lookup: true,
        }
    }

    /// Enable or skip the SPP service record lookup.
    pub fn with_service_lookup(mut self, enabled: bool) -> Self {
        self.service_lookup = enabled;
        self
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn uses_service_lookup(&self) -> bool {
        self.service_lookup
    }

    /// Connect to the SPP service through a client profile.
    async fn open_spp(&self, addr: Address) -> anyhow::Result<Stream> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        let device = adapter.device(addr)?;

        let profile = Profile {
            uuid: SPP_UUID,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let requests = session.register_profile(profile).await?;
        tokio::pin!(requests);

        let connect = device.connect_profile(&SPP_UUID);
        tokio::pin!(connect);
        let mut connected = false;

        loop {
            tokio::select! {
                request = requests.next() => {
                    let request = request.ok_or_else(|| anyhow!("SPP profile unregistered"))?;
                    if request.device() != addr {
                        debug!("Ignoring SPP connection from {}", request.device());
                        continue;
                    }
                    return Ok(request.accept()?);
                }
                result = &mut connect, if !connected => {
                    result?;
                    connected = true;
                }
            }
        }
    }
}

impl Default for RfcommConnector {
    fn default() -> Self {
        Self::new(RFCOMM_CHANNEL)
    }
}

impl Connector for RfcommConnector {
    type Stream = Stream;

    async fn open(&self, address: &DeviceAddress) -> Result<Stream, ConnError> {
        let addr: Address = address
            .as_str()
            .parse()
            .map_err(|_| ConnError::InvalidAddress(address.to_string()))?;

        if self.service_lookup {
            debug!("Connecting to service {} on {}", SPP_UUID, addr);
            match tokio::time::timeout(SERVICE_LOOKUP_TIMEOUT, self.open_spp(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => debug!("SPP service lookup failed: {}", e),
                Err(_) => debug!("SPP service lookup timed out"),
            }
        }

        debug!("Opening RFCOMM channel {} on {}", self.channel, addr);
        Stream::connect(SocketAddr::new(addr, self.channel))
            .await
            .map_err(|e| ConnError::Unreachable(e.to_string()))
    }
}

/// Serial link to one OBD-II adapter.
pub struct SerialLink<C> {
    connector: C,
}

impl<C: Connector> SerialLink<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Establish the stream.
    pub async fn connect(&self, address: &DeviceAddress) -> Result<OpenLink<C::Stream>, ConnError> {
        let stream = self.connector.open(address).await?;
        info!("Serial link open to {}", address);
        Ok(OpenLink::new(stream))
    }
}

/// An established stream speaking CR-terminated commands.
pub struct OpenLink<S> {
    stream: Option<BufReader<S>>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> OpenLink<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(BufReader::new(stream)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one command and return everything received before the prompt.
    pub async fn send_command(&mut self, text: &str) -> Result<String, ConnError> {
        let stream = self.stream.as_mut().ok_or(ConnError::Dropped)?;

        debug!("Sending: {}", text);
        let writer = stream.get_mut();
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\r").await?;
        writer.flush().await?;

        let mut reply = Vec::new();
        stream.read_until(PROMPT, &mut reply).await?;
        if reply.pop() != Some(PROMPT) {
            return Err(ConnError::Dropped);
        }

        let reply = String::from_utf8_lossy(&reply).into_owned();
        debug!("Received: {:?}", reply);
        Ok(reply)
    }

    /// Release the stream. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
            debug!("Serial link closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_send_command_reads_until_prompt() {
        let (client, mut device) = duplex(256);
        let mut link = OpenLink::new(client);

        let device_task = tokio::spawn(async move {
            let mut buf = [0u8; 5];
            device.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"012F\r");
            device.write_all(b"41 2F 5A\r\r>").await.unwrap();
            device
        });

        let reply = link.send_command("012F").await.unwrap();
        assert_eq!(reply, "41 2F 5A\r\r");
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_before_prompt_is_dropped() {
        let (client, mut device) = duplex(256);
        let mut link = OpenLink::new(client);

        tokio::spawn(async move {
            let mut buf = [0u8; 4];
            device.read_exact(&mut buf).await.unwrap();
            device.write_all(b"ELM3").await.unwrap();
        });

        let err = link.send_command("atz").await.unwrap_err();
        assert!(matches!(err, ConnError::Dropped));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _device) = duplex(64);
        let mut link = OpenLink::new(client);

        link.close().await;
        link.close().await;

        assert!(!link.is_open());
        assert!(matches!(
            link.send_command("012F").await,
            Err(ConnError::Dropped)
        ));
    }

    #[test]
    fn test_connector_defaults_to_service_lookup() {
        let connector = RfcommConnector::default();
        assert_eq!(connector.channel(), RFCOMM_CHANNEL);
        assert!(connector.uses_service_lookup());

        let fixed = RfcommConnector::new(3).with_service_lookup(false);
        assert_eq!(fixed.channel(), 3);
        assert!(!fixed.uses_service_lookup());
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let link = SerialLink::new(RfcommConnector::default());
        let result = link.connect(&DeviceAddress::new("not-an-address")).await;
        assert!(matches!(result, Err(ConnError::InvalidAddress(_))));
    }
}
