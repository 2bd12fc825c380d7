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

//! Fuel level polling and low-fuel alerting.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::bluetooth::{elm327, OpenLink};
use crate::error::ConnError;
use crate::location::LocationPort;
use crate::notify::{Notification, NotificationId, NotificationPort};
use crate::state::{AgentState, FuelReading, PollSample};
use crate::storage::{fuel_threshold, KeyValueStore};

/// Runs one fuel query per cycle and raises the alert.
pub struct FuelPoller {
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn NotificationPort>,
    location: Arc<dyn LocationPort>,
    state: Arc<AgentState>,
    alert_shown: bool,
}

impl FuelPoller {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationPort>,
        location: Arc<dyn LocationPort>,
        state: Arc<AgentState>,
    ) -> Self {
        Self {
            store,
            notifier,
            location,
            state,
            alert_shown: false,
        }
    }

    /// Query the adapter and act on the reading.
    pub async fn poll<S>(&mut self, link: &mut OpenLink<S>) -> Result<PollSample, ConnError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let reading = elm327::query_fuel_level(link).await?;
        let sample = PollSample::now(reading);
        self.evaluate(reading);
        self.state.record_sample(sample);
        Ok(sample)
    }

    /// Compare a reading against the stored threshold.
    ///
    /// Every reading below the threshold raises the alert again. Returns
    /// whether an alert was raised.
    pub fn evaluate(&mut self, reading: FuelReading) -> bool {
        let level = match reading {
            FuelReading::Level(level) => level,
            FuelReading::Unparseable => {
                debug!("Fuel reply unparseable, skipping this cycle");
                return false;
            }
        };

        let threshold = fuel_threshold(self.store.as_ref());
        if level < threshold {
            info!("Fuel at {}% (threshold {}%), raising alert", level, threshold);
            let alert = Notification::low_fuel(level, self.location.last_known());
            self.notifier.display(&alert);
            self.alert_shown = true;
            true
        } else {
            debug!("Fuel at {}% (threshold {}%)", level, threshold);
            if self.alert_shown {
                self.notifier.cancel(NotificationId::LowFuel);
                self.alert_shown = false;
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FixedLocation, GeoPoint};
    use crate::notify::{ActionRef, NotifierCall, RecordingNotifier};
    use crate::storage::{MemoryStore, KEY_LOW_FUEL};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn poller(
        store: MemoryStore,
        location: Option<GeoPoint>,
    ) -> (FuelPoller, Arc<RecordingNotifier>, Arc<AgentState>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let state = AgentState::new();
        let poller = FuelPoller::new(
            Arc::new(store),
            notifier.clone(),
            Arc::new(FixedLocation::new(location)),
            state.clone(),
        );
        (poller, notifier, state)
    }

    #[test]
    fn test_below_default_threshold_alerts() {
        let (mut poller, notifier, _) = poller(MemoryStore::new(), None);

        assert!(poller.evaluate(FuelReading::Level(14)));
        assert_eq!(notifier.displayed(NotificationId::LowFuel), 1);
    }

    #[test]
    fn test_above_threshold_is_quiet() {
        let (mut poller, notifier, _) = poller(MemoryStore::new(), None);

        assert!(!poller.evaluate(FuelReading::Level(55)));
        assert!(!poller.evaluate(FuelReading::Level(20)));
        assert!(notifier.calls().is_empty());
    }

    #[test]
    fn test_unparseable_is_skipped() {
        let (mut poller, notifier, _) = poller(MemoryStore::new(), None);

        assert!(!poller.evaluate(FuelReading::Unparseable));
        assert!(notifier.calls().is_empty());
    }

    #[test]
    fn test_every_low_cycle_realerts() {
        let (mut poller, notifier, _) = poller(MemoryStore::new(), None);

        poller.evaluate(FuelReading::Level(10));
        poller.evaluate(FuelReading::Level(9));
        poller.evaluate(FuelReading::Level(9));

        assert_eq!(notifier.displayed(NotificationId::LowFuel), 3);
    }

    #[test]
    fn test_threshold_read_every_cycle() {
        let store = MemoryStore::with(&[(KEY_LOW_FUEL, "10")]);
        let (mut poller, notifier, _) = poller(store, None);

        assert!(!poller.evaluate(FuelReading::Level(14)));
        poller.store.set(KEY_LOW_FUEL, "30").unwrap();
        assert!(poller.evaluate(FuelReading::Level(14)));
        assert_eq!(notifier.displayed(NotificationId::LowFuel), 1);
    }

    #[test]
    fn test_recovery_cancels_alert_once() {
        let (mut poller, notifier, _) = poller(MemoryStore::new(), None);

        poller.evaluate(FuelReading::Level(5));
        poller.evaluate(FuelReading::Level(60));
        poller.evaluate(FuelReading::Level(60));

        assert_eq!(notifier.cancelled(NotificationId::LowFuel), 1);
    }

    #[test]
    fn test_alert_carries_map_query() {
        let point = GeoPoint {
            latitude: 40.0,
            longitude: -3.7,
        };
        let (mut poller, notifier, _) = poller(MemoryStore::new(), Some(point));
        poller.evaluate(FuelReading::Level(3));

        match &notifier.calls()[0] {
            NotifierCall::Display(n) => assert_eq!(
                n.action,
                Some(ActionRef::MapSearch("geo:40,-3.7?q=gas+stations".to_string()))
            ),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_records_sample() {
        let (client, mut device) = duplex(256);
        let mut link = OpenLink::new(client);
        let (mut poller, notifier, state) = poller(MemoryStore::new(), None);

        tokio::spawn(async move {
            let mut buf = [0u8; 5];
            device.read_exact(&mut buf).await.unwrap();
            device.write_all(b"41 2F 14\r\r>").await.unwrap();
            device
        });

        let sample = poller.poll(&mut link).await.unwrap();
        assert_eq!(sample.reading, FuelReading::Level(14));
        assert_eq!(
            state.get_last_sample().map(|s| s.reading),
            Some(FuelReading::Level(14))
        );
        assert_eq!(notifier.displayed(NotificationId::LowFuel), 1);
    }
}
