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

//! Cross-thread signalling between UI-side producers and the worker.
//!
//! An [`EventChannel`] is a single slot guarded by a condition variable.
//! It never holds more than one unread value. What happens when a second
//! write arrives before a read depends on the [`HandoffMode`].

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::storage::DeviceAddress;

/// Event delivered from the UI layer to the startup coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    /// The user switched Bluetooth on.
    AdapterEnabled,
    /// The user picked an OBD-II adapter.
    AddressSelected(DeviceAddress),
    /// Wake-up with no payload.
    None,
}

/// Precondition the coordinator is blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Waiting for Bluetooth to be switched on.
    BtEnable,
    /// Waiting for an adapter to be selected.
    Address,
}

/// How a write behaves when the slot is still occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffMode {
    /// Writer blocks until a reader has consumed its value.
    Rendezvous,
    /// Writer replaces any unread value and returns immediately.
    Latest,
}

struct Slot<T> {
    value: Option<T>,
    written: u64,
    consumed: u64,
}

/// Blocking single-slot channel.
pub struct EventChannel<T> {
    mode: HandoffMode,
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

impl<T> EventChannel<T> {
    /// Create an empty channel.
    pub fn new(mode: HandoffMode) -> Self {
        Self {
            mode,
            slot: Mutex::new(Slot {
                value: None,
                written: 0,
                consumed: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Deposit a value and wake the reader.
    pub fn write(&self, value: T) {
        let mut slot = self.slot.lock();

        match self.mode {
            HandoffMode::Latest => {
                if slot.value.is_some() {
                    debug!("Overwriting unread event");
                }
                slot.value = Some(value);
                slot.written += 1;
                self.changed.notify_all();
            }
            HandoffMode::Rendezvous => {
                // Another writer may still be waiting for its hand-off.
                while slot.value.is_some() {
                    self.changed.wait(&mut slot);
                }
                slot.value = Some(value);
                slot.written += 1;
                let ticket = slot.written;
                self.changed.notify_all();

                while slot.consumed < ticket {
                    self.changed.wait(&mut slot);
                }
            }
        }
    }

    /// Block until a value is available, then take it.
    pub fn read(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.value.take() {
                slot.consumed = slot.written;
                self.changed.notify_all();
                return value;
            }
            self.changed.wait(&mut slot);
        }
    }

    /// Take the value if one is present, without blocking.
    pub fn try_read(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        let value = slot.value.take()?;
        slot.consumed = slot.written;
        self.changed.notify_all();
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_write_then_read_once() {
        let channel = EventChannel::new(HandoffMode::Latest);
        channel.write(PendingEvent::AdapterEnabled);

        assert_eq!(channel.read(), PendingEvent::AdapterEnabled);
        assert_eq!(channel.try_read(), None);
    }

    #[test]
    fn test_latest_overwrites_unread_value() {
        let channel = EventChannel::new(HandoffMode::Latest);
        channel.write(PendingEvent::AddressSelected(DeviceAddress::new("00:11:22:33:44:55")));
        channel.write(PendingEvent::AddressSelected(DeviceAddress::new("66:77:88:99:AA:BB")));

        assert_eq!(
            channel.read(),
            PendingEvent::AddressSelected(DeviceAddress::new("66:77:88:99:AA:BB"))
        );
        assert_eq!(channel.try_read(), None);
    }

    #[test]
    fn test_read_blocks_until_write() {
        let channel = Arc::new(EventChannel::new(HandoffMode::Latest));
        let reader = {
            let channel = channel.clone();
            thread::spawn(move || channel.read())
        };

        thread::sleep(Duration::from_millis(50));
        channel.write(PendingEvent::None);

        assert_eq!(reader.join().unwrap(), PendingEvent::None);
    }

    #[test]
    fn test_rendezvous_write_waits_for_reader() {
        let channel = Arc::new(EventChannel::new(HandoffMode::Rendezvous));
        let delivered = Arc::new(AtomicBool::new(false));

        let writer = {
            let channel = channel.clone();
            let delivered = delivered.clone();
            thread::spawn(move || {
                channel.write(PendingEvent::AdapterEnabled);
                delivered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!delivered.load(Ordering::SeqCst));

        assert_eq!(channel.read(), PendingEvent::AdapterEnabled);
        writer.join().unwrap();
        assert!(delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_rendezvous_second_writer_queues_behind_first() {
        let channel = Arc::new(EventChannel::new(HandoffMode::Rendezvous));

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let channel = channel.clone();
                thread::spawn(move || channel.write(PendingEvent::AdapterEnabled))
            })
            .collect();

        assert_eq!(channel.read(), PendingEvent::AdapterEnabled);
        assert_eq!(channel.read(), PendingEvent::AdapterEnabled);
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(channel.try_read(), None);
    }
}
