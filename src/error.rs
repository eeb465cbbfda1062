// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Ingest error types

/// Reasons a raw message is rejected at the ingest boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    /// Message carries no device name
    #[error("message has no device name")]
    MissingDevice,

    /// Value missing or not decodable for the device class
    #[error("unparseable value for {device}: {value}")]
    UnparseableValue { device: String, value: String },

    /// IMU message whose measurement is not an accel/gyro axis
    #[error("unknown IMU measurement for {device}: {measurement:?}")]
    UnknownAxis { device: String, measurement: Option<String> },
}
