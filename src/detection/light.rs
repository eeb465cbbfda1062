// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Motion-activated lights with an off timeout

use std::collections::BTreeMap;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    pub on: bool,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LightTimer {
    lights: BTreeMap<String, LightState>,
    on_for: Duration,
}

impl LightTimer {
    pub fn new(on_for: Duration) -> Self {
        Self {
            lights: BTreeMap::new(),
            on_for,
        }
    }

    pub fn on_for(&self) -> Duration {
        self.on_for
    }

    /// Switch on (or extend). Returns true only when the light was off.
    pub fn trigger(&mut self, light_id: &str, now: DateTime<Utc>) -> bool {
        let light = self.lights.entry(light_id.to_string()).or_default();
        let was_on = light.on;
        light.on = true;
        light.until = Some(now + self.on_for);
        if was_on {
            debug!("Light {} extended until {:?}", light_id, light.until);
        }
        !was_on
    }

    /// Lights whose timeout passed, now switched off
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut expired = Vec::new();
        for (id, light) in self.lights.iter_mut() {
            if light.on && light.until.map(|u| now >= u).unwrap_or(true) {
                *light = LightState::default();
                expired.push(id.clone());
            }
        }
        expired
    }

    pub fn lights(&self) -> &BTreeMap<String, LightState> {
        &self.lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T12:00:00Z").unwrap().with_timezone(&Utc)
            + Duration::milliseconds(ms)
    }

    #[test]
    fn test_on_then_timeout() {
        let mut lights = LightTimer::new(Duration::seconds(10));
        assert!(lights.trigger("DL1", t(0)));
        assert!(lights.tick(t(9_900)).is_empty());
        assert_eq!(lights.tick(t(10_000)), vec!["DL1".to_string()]);
        assert!(lights.tick(t(20_000)).is_empty());
    }

    #[test]
    fn test_retrigger_extends_without_edge() {
        let mut lights = LightTimer::new(Duration::seconds(10));
        lights.trigger("DL1", t(0));
        assert!(!lights.trigger("DL1", t(8_000)));
        assert!(lights.tick(t(12_000)).is_empty());
        assert_eq!(lights.tick(t(18_000)).len(), 1);
    }
}
