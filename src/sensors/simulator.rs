// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Simulated sensor node for demo/testing

use anyhow::Result;
use async_trait::async_trait;
use rand::prelude::*;
use rand_distr::Normal;
use serde_json::json;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::{EventSource, RawMessage};

/// One thing that happens in the simulated house
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    PersonEnters,
    PersonLeaves,
    DoorBriefly,
    DoorLeftOpen,
    StrayMotion,
    Shake,
    Idle,
}

/// Plays random scenarios as raw node messages
pub struct DemoNode {
    rng: StdRng,
    step: Duration,
    noise: Normal<f64>,
}

impl DemoNode {
    pub fn new(step: Duration) -> Result<Self> {
        Self::with_rng(step, StdRng::from_entropy())
    }

    pub fn with_rng(step: Duration, rng: StdRng) -> Result<Self> {
        Ok(Self {
            rng,
            step,
            noise: Normal::new(0.0, 0.02)?,
        })
    }

    pub fn pick(&mut self) -> Scenario {
        match self.rng.gen_range(0..100) {
            0..=19 => Scenario::PersonEnters,
            20..=39 => Scenario::PersonLeaves,
            40..=54 => Scenario::DoorBriefly,
            55..=59 => Scenario::DoorLeftOpen,
            60..=69 => Scenario::StrayMotion,
            70..=74 => Scenario::Shake,
            _ => Scenario::Idle,
        }
    }

    /// Messages of a scenario, each with the number of steps to wait before it
    pub fn script(&mut self, scenario: Scenario) -> Vec<(u32, RawMessage)> {
        let entry = if self.rng.gen_bool(0.5) { ("DPIR1", "DUS1", "PI1") } else { ("DPIR2", "DUS2", "PI2") };

        match scenario {
            Scenario::PersonEnters | Scenario::PersonLeaves => {
                let (pir, dus, node) = entry;
                let mut ramp = vec![220.0, 150.0, 80.0, 20.0];
                if scenario == Scenario::PersonLeaves {
                    ramp.reverse();
                }
                let mut out: Vec<(u32, RawMessage)> = ramp
                    .into_iter()
                    .map(|d| {
                        let jitter = self.rng.gen_range(-1.0..1.0);
                        (1, RawMessage::reading("Distance", dus, node, json!(d + jitter)))
                    })
                    .collect();
                out.push((0, RawMessage::reading("Motion", pir, node, json!(1))));
                out.push((2, RawMessage::reading("Motion", pir, node, json!(0))));
                out
            }
            Scenario::DoorBriefly => vec![
                (0, RawMessage::reading("Button", "DS1", "PI1", json!(1))),
                (4, RawMessage::reading("Button", "DS1", "PI1", json!(0))),
            ],
            Scenario::DoorLeftOpen => vec![
                (0, RawMessage::reading("Button", "DS2", "PI2", json!(1))),
                (16, RawMessage::reading("Button", "DS2", "PI2", json!(0))),
            ],
            Scenario::StrayMotion => vec![
                (0, RawMessage::reading("Motion", "DPIR3", "PI3", json!(1))),
                (2, RawMessage::reading("Motion", "DPIR3", "PI3", json!(0))),
            ],
            Scenario::Shake => self.imu_frame(1.6, 120.0),
            Scenario::Idle => self.imu_frame(1.0, 0.0),
        }
    }

    /// Six axis messages; acceleration magnitude `g` along z, rotation `dps` around x
    fn imu_frame(&mut self, g: f64, dps: f64) -> Vec<(u32, RawMessage)> {
        let accel = [self.sample(0.0), self.sample(0.0), self.sample(g)];
        let gyro = [self.sample(dps), self.sample(0.0), self.sample(0.0)];

        let mut out = Vec::with_capacity(6);
        for (axis, v) in ["X", "Y", "Z"].iter().zip(accel) {
            out.push((0, RawMessage::reading(&format!("Accelerometer {}", axis), "GSG", "PI2", json!(v))));
        }
        for (axis, v) in ["X", "Y", "Z"].iter().zip(gyro) {
            out.push((0, RawMessage::reading(&format!("Gyroscope {}", axis), "GSG", "PI2", json!(v))));
        }
        out[0].0 = 1;
        out
    }

    fn sample(&mut self, center: f64) -> f64 {
        center + self.noise.sample(&mut self.rng)
    }
}

#[async_trait]
impl EventSource for DemoNode {
    fn name(&self) -> &str {
        "demo"
    }

    async fn run(
        &mut self,
        tx: mpsc::Sender<RawMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Demo node started");

        loop {
            let scenario = self.pick();
            debug!("Demo scenario: {:?}", scenario);

            for (wait, msg) in self.script(scenario) {
                tokio::select! {
                    _ = tokio::time::sleep(self.step * wait) => {}
                    _ = shutdown.recv() => {
                        info!("Demo node stopped");
                        return Ok(());
                    }
                }
                if tx.send(msg).await.is_err() {
                    info!("Ingestion channel closed, demo node stopping");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::sensors::{DeviceClassifier, EventValue};
    use chrono::Utc;

    fn node() -> DemoNode {
        DemoNode::with_rng(Duration::from_millis(1), StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn test_scripts_normalize_cleanly() {
        let classifier = DeviceClassifier::new(DeviceConfig::default());
        let mut node = node();
        for _ in 0..50 {
            let scenario = node.pick();
            for (_, msg) in node.script(scenario) {
                assert!(classifier.normalize(&msg, Utc::now()).is_ok(), "{:?}", msg);
            }
        }
    }

    #[test]
    fn test_enter_ramp_descends_before_motion() {
        let classifier = DeviceClassifier::new(DeviceConfig::default());
        let script = node().script(Scenario::PersonEnters);

        let distances: Vec<f64> = script
            .iter()
            .filter_map(|(_, m)| match classifier.normalize(m, Utc::now()).unwrap().value {
                EventValue::Distance { cm } => Some(cm),
                _ => None,
            })
            .collect();
        assert!(distances.windows(2).all(|w| w[0] - w[1] > 2.0));
        assert_eq!(script[4].1.measurement.as_deref(), Some("Motion"));
    }

    #[tokio::test]
    async fn test_run_feeds_channel_and_stops() {
        let (tx, mut rx) = mpsc::channel(64);
        let (stop, stop_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { node().run(tx, stop_rx).await });

        assert!(rx.recv().await.is_some());
        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
