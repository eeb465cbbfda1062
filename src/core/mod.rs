// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Core module - the controller, its event bus and the periodic scheduler

mod engine;
mod scheduler;
mod event_bus;

pub use engine::Controller;
pub use scheduler::Scheduler;
pub use event_bus::{EventBus, Event, EventPayload, EventType};

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::{AlarmSource, DistanceSample, DoorState, LightState};

/// Read-only view of the controller state for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub people_count: u32,
    pub empty_grace_until: Option<DateTime<Utc>>,
    pub alarm_on: bool,
    pub alarm_reason: String,
    pub alarm_sources: BTreeMap<String, AlarmSource>,
    pub doors: BTreeMap<String, DoorState>,
    pub distance_last_5: BTreeMap<String, Vec<DistanceSample>>,
    pub lights: BTreeMap<String, LightState>,
    /// Last raw value seen per device, whatever its class
    pub sensors: BTreeMap<String, serde_json::Value>,
    pub messages_received: u64,
    pub messages_dropped: u64,
}
