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

//! User-facing notices.
//!
//! The agent only decides what to show. Rendering is up to whatever
//! implements [`NotificationPort`].

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::location::GeoPoint;

/// Fixed notification id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationId {
    EnableBt,
    UnsupportedDev,
    SelectBt,
    LowFuel,
}

impl NotificationId {
    /// Numeric id handed to the platform.
    pub fn code(&self) -> i32 {
        match self {
            Self::EnableBt => 1,
            Self::UnsupportedDev => 2,
            Self::SelectBt => 3,
            Self::LowFuel => 4,
        }
    }
}

/// Kind of action a notice offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    None,
    EnableBluetooth,
    ChooseDevice,
    MapSearch,
}

/// Logical destination opened when the user acts on a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRef {
    /// The system "turn Bluetooth on" screen.
    EnableBluetooth,
    /// The device chooser screen.
    ChooseDevice,
    /// A map application with this query.
    MapSearch(String),
}

/// Content of a single notice.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub action: Option<ActionRef>,
}

fn template(id: NotificationId) -> (&'static str, &'static str, ActionKind) {
    match id {
        NotificationId::EnableBt => (
            "Bluetooth is off",
            "Turn on Bluetooth so the OBD-II adapter can be reached.",
            ActionKind::EnableBluetooth,
        ),
        NotificationId::UnsupportedDev => (
            "Bluetooth unavailable",
            "No Bluetooth adapter was found. Fuel monitoring is disabled.",
            ActionKind::None,
        ),
        NotificationId::SelectBt => (
            "Choose your OBD-II adapter",
            "Select the paired ELM327 adapter to monitor.",
            ActionKind::ChooseDevice,
        ),
        NotificationId::LowFuel => (
            "Low fuel",
            "Fuel is running low. Open to find nearby gas stations.",
            ActionKind::MapSearch,
        ),
    }
}

impl Notification {
    /// Build a precondition notice from the fixed table.
    pub fn precondition(id: NotificationId) -> Self {
        Self::build(id, None)
    }

    /// Build the low-fuel alert. Without a location the alert has no action.
    pub fn low_fuel(level: u32, location: Option<GeoPoint>) -> Self {
        let mut notification = Self::build(NotificationId::LowFuel, location);
        notification.body = format!("Fuel level at {}%. {}", level, notification.body);
        notification
    }

    fn build(id: NotificationId, location: Option<GeoPoint>) -> Self {
        let (title, body, kind) = template(id);
        let action = match kind {
            ActionKind::None => None,
            ActionKind::EnableBluetooth => Some(ActionRef::EnableBluetooth),
            ActionKind::ChooseDevice => Some(ActionRef::ChooseDevice),
            ActionKind::MapSearch => location.map(|p| ActionRef::MapSearch(p.gas_station_query())),
        };

        Self {
            id,
            title: title.to_string(),
            body: body.to_string(),
            action,
        }
    }
}

/// Displays and cancels notices.
pub trait NotificationPort: Send + Sync {
    fn display(&self, notification: &Notification);
    fn cancel(&self, id: NotificationId);
}

/// Writes notices to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn display(&self, notification: &Notification) {
        let action = notification.action.as_ref().map(|a| format!("{:?}", a));
        match notification.id {
            NotificationId::UnsupportedDev | NotificationId::LowFuel => warn!(
                id = notification.id.code(),
                action = action.as_deref().unwrap_or("none"),
                "{}: {}",
                notification.title,
                notification.body
            ),
            _ => info!(
                id = notification.id.code(),
                action = action.as_deref().unwrap_or("none"),
                "{}: {}",
                notification.title,
                notification.body
            ),
        }
    }

    fn cancel(&self, id: NotificationId) {
        info!(id = id.code(), "Notice {:?} cancelled", id);
    }
}

/// A call made on a [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum NotifierCall {
    Display(Notification),
    Cancel(NotificationId),
}

/// Keeps every call in order. Handy for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().clone()
    }

    pub fn displayed(&self, id: NotificationId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, NotifierCall::Display(n) if n.id == id))
            .count()
    }

    pub fn cancelled(&self, id: NotificationId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, NotifierCall::Cancel(c_id) if *c_id == id))
            .count()
    }
}

impl NotificationPort for RecordingNotifier {
    fn display(&self, notification: &Notification) {
        self.calls
            .lock()
            .push(NotifierCall::Display(notification.clone()));
    }

    fn cancel(&self, id: NotificationId) {
        self.calls.lock().push(NotifierCall::Cancel(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_actions() {
        assert_eq!(
            Notification::precondition(NotificationId::EnableBt).action,
            Some(ActionRef::EnableBluetooth)
        );
        assert_eq!(
            Notification::precondition(NotificationId::SelectBt).action,
            Some(ActionRef::ChooseDevice)
        );
        assert_eq!(
            Notification::precondition(NotificationId::UnsupportedDev).action,
            None
        );
    }

    #[test]
    fn test_low_fuel_with_location() {
        let point = GeoPoint {
            latitude: 48.1,
            longitude: 11.6,
        };
        let alert = Notification::low_fuel(14, Some(point));

        assert_eq!(alert.id, NotificationId::LowFuel);
        assert!(alert.body.starts_with("Fuel level at 14%."));
        assert_eq!(
            alert.action,
            Some(ActionRef::MapSearch("geo:48.1,11.6?q=gas+stations".to_string()))
        );
    }

    #[test]
    fn test_low_fuel_without_location_has_no_action() {
        let alert = Notification::low_fuel(5, None);
        assert_eq!(alert.action, None);
    }

    #[test]
    fn test_recording_notifier_counts() {
        let notifier = RecordingNotifier::new();
        notifier.display(&Notification::precondition(NotificationId::SelectBt));
        notifier.cancel(NotificationId::SelectBt);

        assert_eq!(notifier.displayed(NotificationId::SelectBt), 1);
        assert_eq!(notifier.cancelled(NotificationId::SelectBt), 1);
        assert_eq!(notifier.displayed(NotificationId::EnableBt), 0);
    }
}
