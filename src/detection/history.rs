// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Bounded per-sensor distance history

use std::collections::{HashMap, VecDeque};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One ultrasonic reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceSample {
    pub timestamp: DateTime<Utc>,
    pub distance_cm: f64,
}

/// Recent distance samples per ultrasonic sensor, oldest first
#[derive(Debug, Clone)]
pub struct DistanceHistory {
    buffers: HashMap<String, VecDeque<DistanceSample>>,
    window: Duration,
}

impl DistanceHistory {
    pub fn new(window: Duration) -> Self {
        Self {
            buffers: HashMap::new(),
            window,
        }
    }

    /// Append a sample and drop everything older than the window
    pub fn record(&mut self, device_id: &str, timestamp: DateTime<Utc>, distance_cm: f64) {
        let buffer = self.buffers
            .entry(device_id.to_string())
            .or_insert_with(VecDeque::new);

        buffer.push_back(DistanceSample { timestamp, distance_cm });

        let cutoff = timestamp - self.window;
        while buffer.front().map(|s| s.timestamp < cutoff).unwrap_or(false) {
            buffer.pop_front();
        }
    }

    /// Up to `n` most recent samples in chronological order
    pub fn recent(&self, device_id: &str, n: usize) -> Vec<DistanceSample> {
        match self.buffers.get(device_id) {
            Some(buffer) => {
                let skip = buffer.len().saturating_sub(n);
                buffer.iter().skip(skip).copied().collect()
            }
            None => Vec::new(),
        }
    }

    /// Like `recent`, limited to samples at or after `now - lookback`
    pub fn recent_within(
        &self,
        device_id: &str,
        n: usize,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Vec<DistanceSample> {
        let start = now - lookback;
        let mut samples = self.recent(device_id, n);
        samples.retain(|s| s.timestamp >= start);
        samples
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_recent_is_chronological() {
        let mut history = DistanceHistory::new(Duration::seconds(20));
        for (i, d) in [200.0, 150.0, 100.0, 50.0].iter().enumerate() {
            history.record("DUS1", t0() + Duration::seconds(i as i64), *d);
        }

        let recent: Vec<f64> = history.recent("DUS1", 3).iter().map(|s| s.distance_cm).collect();
        assert_eq!(recent, vec![150.0, 100.0, 50.0]);
    }

    #[test]
    fn test_short_history_returns_fewer() {
        let mut history = DistanceHistory::new(Duration::seconds(20));
        history.record("DUS1", t0(), 80.0);

        assert_eq!(history.recent("DUS1", 3).len(), 1);
        assert!(history.recent("DUS2", 3).is_empty());
    }

    #[test]
    fn test_old_samples_pruned_on_write() {
        let mut history = DistanceHistory::new(Duration::seconds(20));
        history.record("DUS1", t0(), 10.0);
        history.record("DUS1", t0() + Duration::seconds(5), 20.0);
        history.record("DUS1", t0() + Duration::seconds(21), 30.0);

        let recent: Vec<f64> = history.recent("DUS1", 10).iter().map(|s| s.distance_cm).collect();
        assert_eq!(recent, vec![20.0, 30.0]);
    }

    #[test]
    fn test_sensors_are_independent() {
        let mut history = DistanceHistory::new(Duration::seconds(20));
        history.record("DUS1", t0(), 10.0);
        history.record("DUS2", t0(), 99.0);

        assert_eq!(history.recent("DUS1", 3)[0].distance_cm, 10.0);
        assert_eq!(history.recent("DUS2", 3)[0].distance_cm, 99.0);
    }

    #[test]
    fn test_recent_within_drops_stale_samples() {
        let mut history = DistanceHistory::new(Duration::seconds(20));
        history.record("DUS2", t0(), 200.0);
        history.record("DUS2", t0() + Duration::seconds(1), 100.0);
        history.record("DUS2", t0() + Duration::seconds(10), 10.0);

        let lookback = Duration::seconds(15);
        assert_eq!(history.recent_within("DUS2", 3, lookback, t0() + Duration::seconds(12)).len(), 3);
        let late = history.recent_within("DUS2", 3, lookback, t0() + Duration::seconds(20));
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].distance_cm, 10.0);
        assert!(history.recent_within("DUS2", 3, lookback, t0() + Duration::seconds(121)).is_empty());
    }
}
