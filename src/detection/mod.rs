// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Detection module - derived facts from the sensor stream
//!
//! Each component owns one piece of derived state and is driven with an
//! explicit `now`, so the engine decides the clock and tests stay deterministic.

mod alarm;
mod door;
mod history;
mod light;
mod motion;
mod occupancy;
mod shake;

pub use alarm::*;
pub use door::*;
pub use history::*;
pub use light::*;
pub use motion::*;
pub use occupancy::*;
pub use shake::*;

use serde::{Deserialize, Serialize};

/// Marker the controller puts on its own commands so loopback can be told apart
pub const CONTROLLER_SOURCE: &str = "controller";

/// Actuator command verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    On,
    Off,
}

/// Wire body of an actuator command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
    pub source: String,
}

/// Command addressed to one actuator topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub target: String,
    pub payload: CommandPayload,
}

impl ActuatorCommand {
    pub fn on(target: &str, reason: Option<String>, ms: Option<u64>) -> Self {
        Self {
            target: target.to_string(),
            payload: CommandPayload {
                command: CommandKind::On,
                reason,
                ms,
                source: CONTROLLER_SOURCE.to_string(),
            },
        }
    }

    pub fn off(target: &str) -> Self {
        Self {
            target: target.to_string(),
            payload: CommandPayload {
                command: CommandKind::Off,
                reason: None,
                ms: None,
                source: CONTROLLER_SOURCE.to_string(),
            },
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.payload.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_shape() {
        let cmd = ActuatorCommand::on("home/actuators/db/cmd", Some("DS1 open > 5.0s".into()), None);
        let json = serde_json::to_value(&cmd.payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"command": "ON", "reason": "DS1 open > 5.0s", "source": "controller"})
        );

        let off = serde_json::to_value(&ActuatorCommand::off("x").payload).unwrap();
        assert_eq!(off, serde_json::json!({"command": "OFF", "source": "controller"}));
    }
}
