// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! HomeGuard - home-automation controller core
//!
//! Aggregates sensor events from distributed nodes, infers occupancy from
//! distance trends, tracks door and movement alarms and drives the buzzer
//! and light actuators.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Controller                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌────────────┐  ┌───────────┐  ┌─────────┐ │
//! │  │ Sensors │→ │ Normalizer │→ │ Detection │→ │  Alarm  │ │
//! │  │ (feeds) │  │            │  │  state    │  │ Arbiter │ │
//! │  └─────────┘  └────────────┘  └───────────┘  └─────────┘ │
//! │       ↑             ↓               ↑              ↓     │
//! │  ┌─────────┐  ┌────────────┐  ┌───────────┐  ┌─────────┐ │
//! │  │  MQTT   │  │  Database  │  │ Scheduler │  │  Event  │ │
//! │  │         │← │ (history)  │  │  (tick)   │  │   Bus   │ │
//! │  └─────────┘  └────────────┘  └───────────┘  └─────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod sensors;
pub mod detection;
pub mod streaming;
pub mod config;
pub mod db;
pub mod error;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{Controller, EventBus, Scheduler, StatusSnapshot};
pub use sensors::{DemoNode, EventSource, RawMessage, SensorEvent};
pub use detection::{ActuatorCommand, CommandKind};
pub use streaming::{MqttClient, MqttFeed, StreamingManager};
pub use db::{Database, HistoryStore};
pub use error::IngestError;

/// HomeGuard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HomeGuard name
pub const NAME: &str = "HomeGuard";
