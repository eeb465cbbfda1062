// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Motion while the house is believed empty

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::occupancy::{Direction, Occupancy, OccupancyOutcome};

/// Raised motion-empty flags, keyed by PIR
#[derive(Debug, Clone, Default)]
pub struct MotionFusion {
    flags: BTreeMap<String, String>,
}

impl MotionFusion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fuse a confirmed PIR detection with occupancy. Returns true if the flag set changed.
    ///
    /// `outcome` is the inference made for a paired PIR, `None` for a PIR without
    /// a distance sensor. Ambiguous or insufficient inferences leave the flags alone.
    pub fn on_detected(
        &mut self,
        motion_id: &str,
        distance_id: Option<&str>,
        outcome: Option<&OccupancyOutcome>,
        occupancy: &Occupancy,
        now: DateTime<Utc>,
    ) -> bool {
        match outcome {
            Some(o) if o.direction == Direction::Enter => self.clear_all(),
            Some(o) if o.direction == Direction::Exit && o.exit_from_empty => {
                let reason = format!(
                    "{} exit while empty ({})",
                    motion_id,
                    distance_id.unwrap_or("-")
                );
                self.raise(motion_id, reason)
            }
            Some(o) if o.direction == Direction::Exit => self.clear(motion_id),
            Some(o) => {
                debug!("{} trend {:?}, motion flags unchanged", motion_id, o.direction);
                false
            }
            None => {
                if occupancy.empty_and_settled(now) {
                    self.raise(motion_id, format!("{} motion while empty", motion_id))
                } else {
                    if occupancy.grace_active(now) {
                        debug!("{} motion suppressed by empty grace window", motion_id);
                    }
                    false
                }
            }
        }
    }

    fn raise(&mut self, motion_id: &str, reason: String) -> bool {
        if self.flags.get(motion_id) == Some(&reason) {
            return false;
        }
        info!("Motion alarm raised: {}", reason);
        self.flags.insert(motion_id.to_string(), reason);
        true
    }

    fn clear(&mut self, motion_id: &str) -> bool {
        self.flags.remove(motion_id).is_some()
    }

    /// Drop every flag. Returns true if any was set.
    pub fn clear_all(&mut self) -> bool {
        let had_any = !self.flags.is_empty();
        self.flags.clear();
        had_any
    }

    pub fn active(&self) -> bool {
        !self.flags.is_empty()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.flags.values().cloned().collect()
    }
}
