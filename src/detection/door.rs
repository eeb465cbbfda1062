// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Door-left-open latch

use std::collections::BTreeMap;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where a door is in its open/latch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorPhase {
    Closed,
    OpenTiming,
    OpenLatched,
}

/// Per-door state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoorState {
    pub is_open: bool,
    pub opened_since: Option<DateTime<Utc>>,
    pub alarm_latched: bool,
}

impl DoorState {
    pub fn phase(&self) -> DoorPhase {
        match (self.is_open, self.alarm_latched) {
            (false, _) => DoorPhase::Closed,
            (true, false) => DoorPhase::OpenTiming,
            (true, true) => DoorPhase::OpenLatched,
        }
    }
}

/// Latches an alarm for every door held open longer than the unlocked limit
#[derive(Debug, Clone)]
pub struct DoorTimer {
    doors: BTreeMap<String, DoorState>,
    unlocked: Duration,
}

impl DoorTimer {
    pub fn new(unlocked: Duration) -> Self {
        Self {
            doors: BTreeMap::new(),
            unlocked,
        }
    }

    /// Apply a contact reading. Returns true when a latch was released.
    pub fn update(&mut self, door_id: &str, open: bool, now: DateTime<Utc>) -> bool {
        let door = self.doors.entry(door_id.to_string()).or_default();

        match (door.is_open, open) {
            (false, true) => {
                door.is_open = true;
                door.opened_since = Some(now);
                debug!("Door {} opened", door_id);
                false
            }
            (true, false) | (false, false) => {
                let released = door.alarm_latched;
                if door.is_open {
                    debug!("Door {} closed", door_id);
                }
                *door = DoorState::default();
                released
            }
            (true, true) => false,
        }
    }

    /// Latch every door whose open time reached the limit. Returns true if any latched now.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let mut latched_any = false;

        for (id, door) in self.doors.iter_mut() {
            if door.phase() != DoorPhase::OpenTiming {
                continue;
            }
            if let Some(since) = door.opened_since {
                if now - since >= self.unlocked {
                    door.alarm_latched = true;
                    latched_any = true;
                    info!("Door {} open for more than {:?}", id, self.unlocked);
                }
            }
        }

        latched_any
    }

    /// Operator override: drop every latch, restart the clock on doors still open
    pub fn clear_latches(&mut self, now: DateTime<Utc>) {
        for door in self.doors.values_mut() {
            door.alarm_latched = false;
            if door.is_open {
                door.opened_since = Some(now);
            }
        }
    }

    pub fn any_latched(&self) -> bool {
        self.doors.values().any(|d| d.alarm_latched)
    }

    /// Human-readable reason per latched door
    pub fn reasons(&self) -> Vec<String> {
        let limit = self.unlocked.num_milliseconds() as f64 / 1000.0;
        self.doors
            .iter()
            .filter(|(_, d)| d.alarm_latched)
            .map(|(id, _)| format!("{} open > {:.1}s", id, limit))
            .collect()
    }

    pub fn doors(&self) -> &BTreeMap<String, DoorState> {
        &self.doors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T12:00:00Z").unwrap().with_timezone(&Utc)
            + Duration::milliseconds(ms)
    }

    fn timer() -> DoorTimer {
        DoorTimer::new(Duration::seconds(5))
    }

    #[test]
    fn test_latches_after_limit() {
        let mut doors = timer();
        doors.update("DS1", true, t(0));
        assert_eq!(doors.doors().get("DS1").unwrap().phase(), DoorPhase::OpenTiming);

        assert!(!doors.tick(t(4_900)));
        assert!(!doors.any_latched());

        assert!(doors.tick(t(5_000)));
        assert_eq!(doors.doors().get("DS1").unwrap().phase(), DoorPhase::OpenLatched);
        assert_eq!(doors.reasons(), vec!["DS1 open > 5.0s".to_string()]);

        // already latched, no second edge
        assert!(!doors.tick(t(6_000)));
    }

    #[test]
    fn test_close_resets_timer() {
        let mut doors = timer();
        doors.update("DS1", true, t(0));
        doors.update("DS1", false, t(3_000));
        doors.update("DS1", true, t(4_000));

        assert!(!doors.tick(t(8_000)));
        assert!(doors.tick(t(9_000)));
    }

    #[test]
    fn test_close_releases_latch() {
        let mut doors = timer();
        doors.update("DS1", true, t(0));
        doors.tick(t(6_000));

        assert!(doors.update("DS1", false, t(7_000)));
        let state = doors.doors().get("DS1").unwrap();
        assert!(!state.alarm_latched);
        assert_eq!(state.opened_since, None);
        assert_eq!(state.phase(), DoorPhase::Closed);
    }

    #[test]
    fn test_repeated_open_keeps_first_timestamp() {
        let mut doors = timer();
        doors.update("DS1", true, t(0));
        doors.update("DS1", true, t(3_000));
        assert!(doors.tick(t(5_000)));
    }

    #[test]
    fn test_clear_latches_restarts_open_doors() {
        let mut doors = timer();
        doors.update("DS1", true, t(0));
        doors.update("DS2", true, t(0));
        doors.tick(t(5_000));
        assert!(doors.any_latched());

        doors.clear_latches(t(5_500));
        assert!(!doors.any_latched());
        assert!(!doors.tick(t(10_000)));
        assert!(doors.tick(t(10_500)));
    }

    #[test]
    fn test_closed_door_never_latches() {
        let mut doors = timer();
        doors.update("DS1", false, t(0));
        assert!(!doors.tick(t(60_000)));
    }
}
