// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! People counting from ultrasonic distance trends
//!
//! A PIR hit at an entry point is resolved into a direction by looking at the
//! last three distance samples of the paired ultrasonic sensor: a shrinking
//! distance means someone walked towards the sensor (entering), a growing one
//! means they walked away (leaving).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shape of three chronologically ordered samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Descending,
    Ascending,
    Flat,
}

/// Classify `a, b, c` (oldest to newest); each step must exceed `eps`
pub fn classify_trend(a: f64, b: f64, c: f64, eps: f64) -> Trend {
    if a - b > eps && b - c > eps {
        Trend::Descending
    } else if b - a > eps && c - b > eps {
        Trend::Ascending
    } else {
        Trend::Flat
    }
}

/// Direction inferred for one PIR trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Enter,
    Exit,
    Ambiguous,
    /// Fewer than three samples were available
    Insufficient,
}

/// Result of one inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyOutcome {
    pub direction: Direction,
    /// Exit observed while the count was already zero
    pub exit_from_empty: bool,
    pub people_count: u32,
}

/// Process-wide occupancy counter
#[derive(Debug, Clone)]
pub struct Occupancy {
    people_count: u32,
    empty_grace_until: Option<DateTime<Utc>>,
    epsilon: f64,
    grace: Duration,
}

impl Occupancy {
    pub fn new(epsilon: f64, grace: Duration) -> Self {
        Self {
            people_count: 0,
            empty_grace_until: None,
            epsilon,
            grace,
        }
    }

    pub fn people_count(&self) -> u32 {
        self.people_count
    }

    pub fn empty_grace_until(&self) -> Option<DateTime<Utc>> {
        self.empty_grace_until
    }

    /// Motion-while-empty detection is suppressed right after the room empties
    pub fn grace_active(&self, now: DateTime<Utc>) -> bool {
        self.people_count == 0 && self.empty_grace_until.map(|t| now < t).unwrap_or(false)
    }

    /// Nobody inside and the grace window is over
    pub fn empty_and_settled(&self, now: DateTime<Utc>) -> bool {
        self.people_count == 0 && !self.grace_active(now)
    }

    /// Update the counter from the latest distance samples (oldest first)
    pub fn infer(&mut self, samples: &[f64], now: DateTime<Utc>) -> OccupancyOutcome {
        if samples.len() < 3 {
            debug!("Not enough distance samples for direction inference: {:?}", samples);
            return self.outcome(Direction::Insufficient, false);
        }

        let n = samples.len();
        let (a, b, c) = (samples[n - 3], samples[n - 2], samples[n - 1]);

        match classify_trend(a, b, c, self.epsilon) {
            Trend::Descending => {
                self.people_count += 1;
                self.outcome(Direction::Enter, false)
            }
            Trend::Ascending if self.people_count > 0 => {
                self.people_count -= 1;
                if self.people_count == 0 {
                    self.empty_grace_until = Some(now + self.grace);
                }
                self.outcome(Direction::Exit, false)
            }
            Trend::Ascending => self.outcome(Direction::Exit, true),
            Trend::Flat => self.outcome(Direction::Ambiguous, false),
        }
    }

    fn outcome(&self, direction: Direction, exit_from_empty: bool) -> OccupancyOutcome {
        OccupancyOutcome {
            direction,
            exit_from_empty,
            people_count: self.people_count,
        }
    }
}
