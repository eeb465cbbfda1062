// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module

use anyhow::{ensure, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::streaming::StreamingConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Feed the controller from the built-in simulated node
    pub demo_mode: bool,

    /// Device naming and pairing
    pub devices: DeviceConfig,

    /// Detection thresholds and timings
    pub detection: DetectionConfig,

    /// MQTT transport
    pub streaming: StreamingConfig,

    /// History store
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "HomeGuard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            demo_mode: false,
            devices: DeviceConfig::default(),
            detection: DetectionConfig::default(),
            streaming: StreamingConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.detection.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("homeguard"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// One physical entry point: a PIR and the ultrasonic sensor looking at the same doorway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryPoint {
    pub motion: String,
    pub distance: String,
}

/// A PIR that switches a light on for a while
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LightTrigger {
    pub motion: String,
    pub light: String,
}

/// Device naming conventions and pairings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Door contact id prefix (DS1, DS2, ...)
    pub door_prefix: String,

    /// PIR id prefix (DPIR1, ...)
    pub motion_prefix: String,

    /// Ultrasonic id prefix (DUS1, ...)
    pub distance_prefix: String,

    /// Gyro/accelerometer id prefix (GSG)
    pub imu_prefix: String,

    /// Door contact reports 1 when the door is open
    pub door_active_high: bool,

    pub entry_points: Vec<EntryPoint>,

    pub light_triggers: Vec<LightTrigger>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            door_prefix: "DS".to_string(),
            motion_prefix: "DPIR".to_string(),
            distance_prefix: "DUS".to_string(),
            imu_prefix: "GSG".to_string(),
            door_active_high: true,
            entry_points: vec![
                EntryPoint { motion: "DPIR1".to_string(), distance: "DUS1".to_string() },
                EntryPoint { motion: "DPIR2".to_string(), distance: "DUS2".to_string() },
            ],
            light_triggers: vec![
                LightTrigger { motion: "DPIR1".to_string(), light: "DL1".to_string() },
            ],
        }
    }
}

impl DeviceConfig {
    /// Distance sensor paired with a PIR, if the PIR guards an entry point
    pub fn paired_distance(&self, motion_id: &str) -> Option<&str> {
        self.entry_points
            .iter()
            .find(|e| e.motion == motion_id)
            .map(|e| e.distance.as_str())
    }

    /// Light switched by a PIR
    pub fn triggered_light(&self, motion_id: &str) -> Option<&str> {
        self.light_triggers
            .iter()
            .find(|t| t.motion == motion_id)
            .map(|t| t.light.as_str())
    }
}

/// Detection thresholds and timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum per-step distance change treated as real movement (cm)
    pub trend_epsilon: f64,

    /// How long distance samples are kept in memory
    pub history_window_secs: f64,

    /// Lookback used when asking the history store for recent distances
    pub query_lookback_secs: f64,

    /// Motion-while-empty suppression after the last person leaves
    pub empty_grace_secs: f64,

    /// Door open longer than this raises the alarm
    pub door_unlocked_secs: f64,

    /// |‖a‖ - 1g| at or above this counts as movement
    pub accel_deviation_g: f64,

    /// ‖ω‖ at or above this counts as movement (deg/s)
    pub gyro_threshold: f64,

    pub shake_cooldown_secs: f64,

    /// Shake alarm is cleared automatically after this long
    pub alarm_hold_secs: f64,

    pub light_on_secs: f64,

    pub tick_interval_ms: u64,

    pub status_interval_secs: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            trend_epsilon: 2.0,
            history_window_secs: 20.0,
            query_lookback_secs: 15.0,
            empty_grace_secs: 4.0,
            door_unlocked_secs: 5.0,
            accel_deviation_g: 0.25,
            gyro_threshold: 80.0,
            shake_cooldown_secs: 2.0,
            alarm_hold_secs: 10.0,
            light_on_secs: 10.0,
            tick_interval_ms: 100,
            status_interval_secs: 5,
        }
    }
}

/// Longest timing accepted from the config
const MAX_TIMING_SECS: f64 = 7.0 * 24.0 * 3600.0;

impl DetectionConfig {
    /// Reject timings and thresholds that cannot be turned into durations
    pub fn validate(&self) -> Result<()> {
        let timings = [
            ("history_window_secs", self.history_window_secs),
            ("query_lookback_secs", self.query_lookback_secs),
            ("empty_grace_secs", self.empty_grace_secs),
            ("door_unlocked_secs", self.door_unlocked_secs),
            ("shake_cooldown_secs", self.shake_cooldown_secs),
            ("alarm_hold_secs", self.alarm_hold_secs),
            ("light_on_secs", self.light_on_secs),
        ];
        for (name, value) in timings {
            ensure!(
                value.is_finite() && (0.0..=MAX_TIMING_SECS).contains(&value),
                "detection.{} must be between 0 and {} seconds, got {}",
                name,
                MAX_TIMING_SECS,
                value
            );
        }

        let thresholds = [
            ("trend_epsilon", self.trend_epsilon),
            ("accel_deviation_g", self.accel_deviation_g),
            ("gyro_threshold", self.gyro_threshold),
        ];
        for (name, value) in thresholds {
            ensure!(
                value.is_finite() && value >= 0.0,
                "detection.{} must be a non-negative number, got {}",
                name,
                value
            );
        }

        ensure!(self.tick_interval_ms > 0, "detection.tick_interval_ms must be positive");
        ensure!(self.status_interval_secs > 0, "detection.status_interval_secs must be positive");
        Ok(())
    }
}

/// Convert fractional seconds from the config into a chrono duration
pub fn secs(value: f64) -> Duration {
    Duration::milliseconds((value * 1000.0).round() as i64)
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Enable the SQLite history store
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,

    /// Retention period in days
    pub retention_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/homeguard.db"),
            retention_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pairings() {
        let devices = DeviceConfig::default();
        assert_eq!(devices.paired_distance("DPIR1"), Some("DUS1"));
        assert_eq!(devices.paired_distance("DPIR2"), Some("DUS2"));
        assert_eq!(devices.paired_distance("DPIR3"), None);
        assert_eq!(devices.triggered_light("DPIR1"), Some("DL1"));
        assert_eq!(devices.triggered_light("DPIR2"), None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            demo_mode = true

            [detection]
            door_unlocked_secs = 8.0
            "#,
        )
        .unwrap();

        assert!(config.demo_mode);
        assert_eq!(config.detection.door_unlocked_secs, 8.0);
        assert_eq!(config.detection.trend_epsilon, 2.0);
        assert_eq!(config.devices.door_prefix, "DS");
        assert_eq!(config.streaming.mqtt_port, 1883);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.devices.entry_points, config.devices.entry_points);
        assert_eq!(back.streaming.alarm_topic, config.streaming.alarm_topic);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_timings_rejected() {
        let config: Config = toml::from_str(
            r#"
            [detection]
            empty_grace_secs = inf
            "#,
        )
        .unwrap();
        assert!(config.detection.validate().is_err());

        let mut detection = DetectionConfig::default();
        detection.door_unlocked_secs = f64::NAN;
        assert!(detection.validate().is_err());

        let mut detection = DetectionConfig::default();
        detection.light_on_secs = 1e300;
        assert!(detection.validate().is_err());

        let mut detection = DetectionConfig::default();
        detection.trend_epsilon = -1.0;
        assert!(detection.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("homeguard-invalid-{}.toml", std::process::id()));
        std::fs::write(&path, "[detection]\nalarm_hold_secs = -3.0\n").unwrap();
        let result = Config::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_secs_conversion() {
        assert_eq!(secs(4.0), Duration::seconds(4));
        assert_eq!(secs(0.1), Duration::milliseconds(100));
    }
}
