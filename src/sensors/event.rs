// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Raw message shape and the canonical sensor event

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DeviceConfig;
use crate::error::IngestError;

/// Loosely-typed message as published by the sensor nodes
///
/// Every field is optional on the wire; normalization decides what is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    /// Transport topic, filled in by the receiving adapter
    #[serde(skip)]
    pub topic: String,

    #[serde(default)]
    pub measurement: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub runs_on: Option<String>,

    #[serde(default)]
    pub simulated: Option<bool>,

    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub timestamp: Option<Value>,

    /// Actuator command, present on command-channel messages
    #[serde(default)]
    pub command: Option<String>,

    /// Who issued the command
    #[serde(default)]
    pub source: Option<String>,
}

impl RawMessage {
    /// Decode a transport payload
    pub fn from_payload(topic: &str, payload: &[u8]) -> serde_json::Result<Self> {
        let mut msg: RawMessage = serde_json::from_slice(payload)?;
        msg.topic = topic.to_string();
        Ok(msg)
    }

    /// Convenience constructor for a sensor reading
    pub fn reading(measurement: &str, name: &str, runs_on: &str, value: Value) -> Self {
        Self {
            topic: format!("{}/{}", runs_on, name),
            measurement: Some(measurement.to_string()),
            name: Some(name.to_string()),
            runs_on: Some(runs_on.to_string()),
            simulated: Some(true),
            value,
            ..Default::default()
        }
    }

    /// Device name, if present and non-empty
    pub fn device_id(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Device classes the controller distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    DoorContact,
    MotionSensor,
    DistanceSensor,
    ImuAxisSample,
    Generic,
}

/// Accelerometer or gyroscope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImuKind {
    Accel,
    Gyro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Typed payload of a canonical event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventValue {
    /// Door contact, already mapped through the configured polarity
    Door { open: bool },
    Motion { detected: bool },
    Distance { cm: f64 },
    Axis { kind: ImuKind, axis: Axis, reading: f64 },
    Raw(Value),
}

impl EventValue {
    /// Numeric form used by the history store
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EventValue::Door { open } => Some(if *open { 1.0 } else { 0.0 }),
            EventValue::Motion { detected } => Some(if *detected { 1.0 } else { 0.0 }),
            EventValue::Distance { cm } => Some(*cm),
            EventValue::Axis { reading, .. } => Some(*reading),
            EventValue::Raw(v) => number_like(v),
        }
    }
}

/// Canonical sensor event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub device_class: DeviceClass,
    pub device_id: String,
    pub origin_node: String,
    pub measurement: String,
    pub simulated: bool,
    /// Sender clock if the node supplied one, otherwise receipt time
    pub timestamp: DateTime<Utc>,
    /// Controller clock at ingest; all windows are measured on this
    pub received_at: DateTime<Utc>,
    pub value: EventValue,
}

/// Maps device ids onto classes by their naming prefix
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    devices: DeviceConfig,
}

impl DeviceClassifier {
    pub fn new(devices: DeviceConfig) -> Self {
        Self { devices }
    }

    pub fn classify(&self, device_id: &str) -> DeviceClass {
        let d = &self.devices;
        // door prefix last: it is the shortest and may shadow the others
        if device_id.starts_with(&d.motion_prefix) {
            DeviceClass::MotionSensor
        } else if device_id.starts_with(&d.distance_prefix) {
            DeviceClass::DistanceSensor
        } else if device_id.starts_with(&d.imu_prefix) {
            DeviceClass::ImuAxisSample
        } else if device_id.starts_with(&d.door_prefix) {
            DeviceClass::DoorContact
        } else {
            DeviceClass::Generic
        }
    }

    /// Normalize a raw message into a canonical event
    pub fn normalize(
        &self,
        raw: &RawMessage,
        received_at: DateTime<Utc>,
    ) -> Result<SensorEvent, IngestError> {
        let device_id = raw.device_id().ok_or(IngestError::MissingDevice)?;
        let device_class = self.classify(device_id);

        let unparseable = || IngestError::UnparseableValue {
            device: device_id.to_string(),
            value: raw.value.to_string(),
        };

        let value = match device_class {
            DeviceClass::DoorContact => {
                let active = bool_like(&raw.value).ok_or_else(unparseable)?;
                EventValue::Door { open: active == self.devices.door_active_high }
            }
            DeviceClass::MotionSensor => {
                let detected = bool_like(&raw.value).ok_or_else(unparseable)?;
                EventValue::Motion { detected }
            }
            DeviceClass::DistanceSensor => {
                let cm = number_like(&raw.value).ok_or_else(unparseable)?;
                EventValue::Distance { cm }
            }
            DeviceClass::ImuAxisSample => {
                let (kind, axis) = raw
                    .measurement
                    .as_deref()
                    .and_then(parse_axis_measurement)
                    .ok_or_else(|| IngestError::UnknownAxis {
                        device: device_id.to_string(),
                        measurement: raw.measurement.clone(),
                    })?;
                let reading = number_like(&raw.value).ok_or_else(unparseable)?;
                EventValue::Axis { kind, axis, reading }
            }
            DeviceClass::Generic => EventValue::Raw(raw.value.clone()),
        };

        Ok(SensorEvent {
            device_class,
            device_id: device_id.to_string(),
            origin_node: raw.runs_on.clone().unwrap_or_default(),
            measurement: raw.measurement.clone().unwrap_or_default(),
            simulated: raw.simulated.unwrap_or(false),
            timestamp: raw
                .timestamp
                .as_ref()
                .and_then(parse_timestamp)
                .unwrap_or(received_at),
            received_at,
            value,
        })
    }
}

/// Interpret the boolean-ish encodings the nodes use (1/0, true/false, "detected", ...)
pub fn bool_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "open" | "detected" | "pressed" => Some(true),
            "0" | "false" | "off" | "closed" | "released" | "clear" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Finite number from a JSON number or numeric string
pub fn number_like(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// "Accelerometer X" / "Gyroscope z" -> (kind, axis)
fn parse_axis_measurement(measurement: &str) -> Option<(ImuKind, Axis)> {
    let mut parts = measurement.split_whitespace();
    let kind = match parts.next()?.to_ascii_lowercase().as_str() {
        "accelerometer" | "accel" => ImuKind::Accel,
        "gyroscope" | "gyro" => ImuKind::Gyro,
        _ => return None,
    };
    let axis = match parts.next()?.to_ascii_uppercase().as_str() {
        "X" => Axis::X,
        "Y" => Axis::Y,
        "Z" => Axis::Z,
        _ => return None,
    };
    Some((kind, axis))
}

/// Epoch seconds (float) or RFC 3339 text
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = (n.as_f64()? * 1000.0).round() as i64;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> DeviceClassifier {
        DeviceClassifier::new(DeviceConfig::default())
    }

    #[test]
    fn test_classify_by_prefix() {
        let c = classifier();
        assert_eq!(c.classify("DS1"), DeviceClass::DoorContact);
        assert_eq!(c.classify("DPIR3"), DeviceClass::MotionSensor);
        assert_eq!(c.classify("DUS2"), DeviceClass::DistanceSensor);
        assert_eq!(c.classify("GSG"), DeviceClass::ImuAxisSample);
        assert_eq!(c.classify("DHT1"), DeviceClass::Generic);
    }

    #[test]
    fn test_decode_node_payload() {
        let payload = br#"{"measurement":"Distance","simulated":true,"runs_on":"PI1","name":"DUS1","value":123.4}"#;
        let raw = RawMessage::from_payload("PI1/DUS1", payload).unwrap();
        let event = classifier().normalize(&raw, Utc::now()).unwrap();

        assert_eq!(event.device_class, DeviceClass::DistanceSensor);
        assert_eq!(event.origin_node, "PI1");
        assert!(event.simulated);
        assert_eq!(event.value, EventValue::Distance { cm: 123.4 });
    }

    #[test]
    fn test_door_polarity() {
        let raw = RawMessage::reading("Button", "DS1", "PI1", json!(1));
        let event = classifier().normalize(&raw, Utc::now()).unwrap();
        assert_eq!(event.value, EventValue::Door { open: true });

        let mut devices = DeviceConfig::default();
        devices.door_active_high = false;
        let event = DeviceClassifier::new(devices).normalize(&raw, Utc::now()).unwrap();
        assert_eq!(event.value, EventValue::Door { open: false });
    }

    #[test]
    fn test_motion_encodings() {
        for v in [json!(1), json!(true), json!("True"), json!("detected")] {
            let raw = RawMessage::reading("Motion", "DPIR1", "PI1", v);
            let event = classifier().normalize(&raw, Utc::now()).unwrap();
            assert_eq!(event.value, EventValue::Motion { detected: true });
        }
        let raw = RawMessage::reading("Motion", "DPIR1", "PI1", json!(0));
        let event = classifier().normalize(&raw, Utc::now()).unwrap();
        assert_eq!(event.value, EventValue::Motion { detected: false });
    }

    #[test]
    fn test_axis_sample() {
        let raw = RawMessage::reading("Gyroscope Z", "GSG", "PI2", json!("-12.5"));
        let event = classifier().normalize(&raw, Utc::now()).unwrap();
        assert_eq!(
            event.value,
            EventValue::Axis { kind: ImuKind::Gyro, axis: Axis::Z, reading: -12.5 }
        );
    }

    #[test]
    fn test_malformed_values_rejected() {
        let c = classifier();
        let now = Utc::now();

        let raw = RawMessage::reading("Button", "DS1", "PI1", json!("maybe"));
        assert!(matches!(c.normalize(&raw, now), Err(IngestError::UnparseableValue { .. })));

        let raw = RawMessage::reading("Distance", "DUS1", "PI1", json!("far"));
        assert!(c.normalize(&raw, now).is_err());

        let raw = RawMessage::reading("Temperature", "GSG", "PI2", json!(1.0));
        assert!(matches!(c.normalize(&raw, now), Err(IngestError::UnknownAxis { .. })));

        let raw = RawMessage { value: json!(1), ..Default::default() };
        assert_eq!(c.normalize(&raw, now), Err(IngestError::MissingDevice));
    }

    #[test]
    fn test_generic_keeps_raw_value() {
        let raw = RawMessage::reading("Humidity", "DHT1", "PI3", json!({"h": 40}));
        let event = classifier().normalize(&raw, Utc::now()).unwrap();
        assert_eq!(event.value, EventValue::Raw(json!({"h": 40})));
    }

    #[test]
    fn test_sender_timestamp() {
        let mut raw = RawMessage::reading("Distance", "DUS1", "PI1", json!(10.0));
        raw.timestamp = Some(json!(1_700_000_000.5));
        let received = Utc::now();
        let event = classifier().normalize(&raw, received).unwrap();
        assert_eq!(event.timestamp.timestamp_millis(), 1_700_000_000_500);
        assert_eq!(event.received_at, received);
    }
}
