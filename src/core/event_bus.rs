// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Event bus for outbound controller traffic
//!
//! The controller never talks to the broker itself: commands and status
//! snapshots are broadcast here and picked up by the publishing task.

use tokio::sync::broadcast;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::detection::ActuatorCommand;
use super::StatusSnapshot;

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Command,
    Status,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Command(ActuatorCommand),
    Status(Box<StatusSnapshot>),
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: std::sync::atomic::AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn publish_command(&self, command: ActuatorCommand) {
        self.publish_event(EventType::Command, EventPayload::Command(command));
    }

    pub fn publish_status(&self, snapshot: StatusSnapshot) {
        self.publish_event(EventType::Status, EventPayload::Status(Box::new(snapshot)));
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        // Err only means there is no subscriber
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_reach_subscribers_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish_command(ActuatorCommand::on("a", None, None));
        bus.publish_command(ActuatorCommand::off("a"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::Command);
        assert!(first.id < second.id);
        match second.payload {
            EventPayload::Command(cmd) => assert_eq!(cmd, ActuatorCommand::off("a")),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish_command(ActuatorCommand::off("a"));
    }
}
