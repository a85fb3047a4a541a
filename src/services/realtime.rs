// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process broadcast groups for WebSocket subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Events buffered per group before slow subscribers start lagging.
const GROUP_CAPACITY: usize = 256;

/// Broadcast group a socket joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Locations,
    Donations,
}

impl Group {
    pub fn name(&self) -> &'static str {
        match self {
            Group::Locations => "locations",
            Group::Donations => "donations",
        }
    }

    /// Event kind used when relaying a client's own message.
    pub fn relay_kind(&self) -> EventKind {
        match self {
            Group::Locations => EventKind::LocationUpdate,
            Group::Donations => EventKind::DonationUpdate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LocationUpdate,
    QrScanNotification,
    DonatorTrackingUpdate,
    DonationUpdate,
}

/// Message delivered to every socket in a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
}

/// Fan-out hub with one broadcast channel per group.
#[derive(Clone)]
pub struct RealtimeHub {
    locations: broadcast::Sender<GroupEvent>,
    donations: broadcast::Sender<GroupEvent>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (locations, _) = broadcast::channel(GROUP_CAPACITY);
        let (donations, _) = broadcast::channel(GROUP_CAPACITY);
        Self {
            locations,
            donations,
        }
    }

    fn sender(&self, group: Group) -> &broadcast::Sender<GroupEvent> {
        match group {
            Group::Locations => &self.locations,
            Group::Donations => &self.donations,
        }
    }

    pub fn subscribe(&self, group: Group) -> broadcast::Receiver<GroupEvent> {
        self.sender(group).subscribe()
    }

    /// Receivers currently joined to `group`.
    pub fn subscriber_count(&self, group: Group) -> usize {
        self.sender(group).receiver_count()
    }

    /// Send an event to a group. Having no subscribers is not an error.
    pub fn publish(&self, group: Group, kind: EventKind, data: Value) {
        let event = GroupEvent { kind, data };
        match self.sender(group).send(event) {
            Ok(receivers) => {
                tracing::debug!(group = group.name(), ?kind, receivers, "Broadcast event")
            }
            Err(_) => tracing::debug!(group = group.name(), ?kind, "No subscribers for event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_group_only() {
        let hub = RealtimeHub::new();
        let mut locations = hub.subscribe(Group::Locations);
        let mut donations = hub.subscribe(Group::Donations);

        hub.publish(
            Group::Locations,
            EventKind::QrScanNotification,
            json!({"session_id": "abc"}),
        );

        assert_eq!(hub.subscriber_count(Group::Locations), 1);
        let event = locations.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::QrScanNotification);
        assert_eq!(event.data["session_id"], "abc");
        assert!(donations.try_recv().is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let event = GroupEvent {
            kind: EventKind::DonatorTrackingUpdate,
            data: json!({"locationId": 4}),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "donator_tracking_update", "data": {"locationId": 4}})
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        RealtimeHub::new().publish(Group::Donations, EventKind::DonationUpdate, json!({}));
    }
}
