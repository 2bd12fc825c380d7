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

//! Connection supervision.
//!
//! The supervisor owns the serial link and the job queue. A failed open is
//! retried after the reconnect delay, forever. A session that drops while
//! polling is torn down and reopened straight away.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bluetooth::{elm327, Connector, OpenLink, SerialLink};
use crate::config::ObdConfig;
use crate::poller::FuelPoller;
use crate::state::AgentState;
use crate::storage::DeviceAddress;
use crate::worker::{Job, Scheduled, WorkQueue};

/// Delays used by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after a connection attempt fails.
    pub reconnect_delay: Duration,
    /// Wait between successful polls.
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl From<&ObdConfig> for RetryPolicy {
    fn from(config: &ObdConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Keeps a session to the adapter alive and polls it.
pub struct ConnectionSupervisor<C: Connector> {
    link: SerialLink<C>,
    session: Option<OpenLink<C::Stream>>,
    poller: FuelPoller,
    queue: WorkQueue,
    address: Option<DeviceAddress>,
    policy: RetryPolicy,
    state: Arc<AgentState>,
}

impl<C: Connector> ConnectionSupervisor<C> {
    pub fn new(
        link: SerialLink<C>,
        poller: FuelPoller,
        policy: RetryPolicy,
        state: Arc<AgentState>,
    ) -> Self {
        Self {
            link,
            session: None,
            poller,
            queue: WorkQueue::new(),
            address: None,
            policy,
            state,
        }
    }

    /// Hand over the adapter address and queue the first connection attempt.
    pub fn start(&mut self, address: DeviceAddress) {
        info!("Supervising connection to {}", address);
        self.address = Some(address);
        self.queue.post(Job::Connect);
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Drive the queue. Never returns once started.
    pub async fn run(&mut self) {
        while self.run_once().await.is_some() {}
        debug!("Supervisor queue drained");
    }

    /// Run the next due job and queue its follow-up.
    pub async fn run_once(&mut self) -> Option<Scheduled> {
        let job = self.queue.next().await?;
        let next = match job {
            Job::Connect => self.connect().await?,
            Job::Poll => self.poll().await,
        };
        self.queue.schedule(next);
        Some(next)
    }

    async fn connect(&mut self) -> Option<Scheduled> {
        let address = self.address.clone()?;
        self.close_session().await;
        self.state.set_connecting(address.as_str());

        let mut session = match self.link.connect(&address).await {
            Ok(session) => session,
            Err(e) => return Some(self.retry_later(e.to_string())),
        };

        if let Err(e) = elm327::init_session(&mut session).await {
            session.close().await;
            return Some(self.retry_later(format!("init failed: {}", e)));
        }

        info!("ELM327 session established with {}", address);
        self.session = Some(session);
        self.state.set_connected();
        Some(Scheduled::now(Job::Poll))
    }

    async fn poll(&mut self) -> Scheduled {
        let Some(session) = self.session.as_mut() else {
            return Scheduled::now(Job::Connect);
        };

        match self.poller.poll(session).await {
            Ok(sample) => {
                debug!("Poll sample {:?}", sample.reading);
                Scheduled::after(Job::Poll, self.policy.poll_interval)
            }
            Err(e) => {
                warn!("Session dropped: {}, reconnecting", e);
                self.close_session().await;
                self.state.set_disconnected();
                Scheduled::now(Job::Connect)
            }
        }
    }

    fn retry_later(&self, reason: String) -> Scheduled {
        warn!(
            "Connection failed: {}, retrying in {:?}",
            reason, self.policy.reconnect_delay
        );
        self.state.set_failed(reason);
        Scheduled::after(Job::Connect, self.policy.reconnect_delay)
    }

    async fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}
