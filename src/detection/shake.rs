// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Significant-movement detection from accelerometer + gyroscope axes

use std::collections::HashMap;
use chrono::{DateTime, Duration, Utc};
use nalgebra::Vector3;
use tracing::info;

use crate::sensors::{Axis, ImuKind};

/// Latest axis values for one IMU
#[derive(Debug, Clone, Default)]
pub struct ImuSample {
    pub accel: [Option<f64>; 3],
    pub gyro: [Option<f64>; 3],
    pub last_trigger_at: Option<DateTime<Utc>>,
}

impl ImuSample {
    fn set(&mut self, kind: ImuKind, axis: Axis, value: f64) {
        match kind {
            ImuKind::Accel => self.accel[axis.index()] = Some(value),
            ImuKind::Gyro => self.gyro[axis.index()] = Some(value),
        }
    }

    /// Both vectors, once every axis has reported
    pub fn vectors(&self) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let [ax, ay, az] = self.accel;
        let [gx, gy, gz] = self.gyro;
        Some((
            Vector3::new(ax?, ay?, az?),
            Vector3::new(gx?, gy?, gz?),
        ))
    }
}

/// Thresholds for the movement decision
#[derive(Debug, Clone, Copy)]
pub struct ShakeThresholds {
    pub accel_deviation_g: f64,
    pub gyro_threshold: f64,
    pub cooldown: Duration,
    pub hold: Duration,
}

/// Movement test on the two norms
pub fn is_significant(acc_norm: f64, gyr_norm: f64, thresholds: &ShakeThresholds) -> bool {
    (acc_norm - 1.0).abs() >= thresholds.accel_deviation_g || gyr_norm >= thresholds.gyro_threshold
}

#[derive(Debug, Clone)]
struct RaisedShake {
    at: DateTime<Utc>,
    reason: String,
}

/// Cooldown-gated shake detector feeding the movement alarm source
#[derive(Debug, Clone)]
pub struct ShakeDetector {
    samples: HashMap<String, ImuSample>,
    thresholds: ShakeThresholds,
    raised: Option<RaisedShake>,
}

impl ShakeDetector {
    pub fn new(thresholds: ShakeThresholds) -> Self {
        Self {
            samples: HashMap::new(),
            thresholds,
            raised: None,
        }
    }

    /// Record one axis value. Returns true when this update triggered.
    pub fn update(
        &mut self,
        device_id: &str,
        kind: ImuKind,
        axis: Axis,
        value: f64,
        now: DateTime<Utc>,
    ) -> bool {
        let sample = self.samples.entry(device_id.to_string()).or_default();
        sample.set(kind, axis, value);

        let Some((acc, gyr)) = sample.vectors() else {
            return false;
        };

        let cooled_down = sample
            .last_trigger_at
            .map(|t| now - t >= self.thresholds.cooldown)
            .unwrap_or(true);
        if !cooled_down {
            return false;
        }

        let (acc_norm, gyr_norm) = (acc.norm(), gyr.norm());
        if !is_significant(acc_norm, gyr_norm, &self.thresholds) {
            return false;
        }

        sample.last_trigger_at = Some(now);
        let reason = format!(
            "{} moved (acc={:.2}g, gyr={:.1}dps)",
            device_id, acc_norm, gyr_norm
        );
        info!("Significant movement: {}", reason);
        self.raised = Some(RaisedShake { at: now, reason });
        true
    }

    /// Clear the source once the hold time has passed. Returns true if it cleared.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        match &self.raised {
            Some(r) if now - r.at >= self.thresholds.hold => {
                self.raised = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) -> bool {
        self.raised.take().is_some()
    }

    pub fn active(&self) -> bool {
        self.raised.is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.raised.as_ref().map(|r| r.reason.as_str())
    }
}
