// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Device identity and the MQTT topics derived from it.
//!
//! Real-time readings go to `{prefix}{sensor_type}/{sensor_id}`, recovered
//! batches to the same topic with a `/recovered` suffix.

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

use serde::{Deserialize, Serialize};

/// Topic suffix for recovered batches.
pub const RECOVERED_SUFFIX: &str = "recovered";

/// Identity of the one sensor this device runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Topic prefix including its trailing slash, e.g. `lab/floor2/`.
    pub topic_prefix: String,
    /// Sensor kind, e.g. `temp`.
    #[serde(default = "default_sensor_type")]
    pub sensor_type: String,
    /// Unique sensor name, e.g. `Sensor_One`.
    pub sensor_id: String,
    /// MQTT client id. Defaults to `thermolog_{sensor_id}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

fn default_sensor_type() -> String {
    "temp".to_string()
}

impl DeviceIdentity {
    pub fn new(
        topic_prefix: impl Into<String>,
        sensor_type: impl Into<String>,
        sensor_id: impl Into<String>,
    ) -> Self {
        DeviceIdentity {
            topic_prefix: topic_prefix.into(),
            sensor_type: sensor_type.into(),
            sensor_id: sensor_id.into(),
            client_id: None,
        }
    }

    /// The MQTT client id to connect with.
    pub fn client_id(&self) -> String {
        match &self.client_id {
            Some(id) => id.clone(),
            None => format!("thermolog_{}", self.sensor_id),
        }
    }

    /// Topics for this device.
    pub fn topics(&self) -> Topics {
        Topics {
            realtime: full_topic(&self.topic_prefix, &self.sensor_type, &self.sensor_id, None),
            recovered: full_topic(
                &self.topic_prefix,
                &self.sensor_type,
                &self.sensor_id,
                Some(RECOVERED_SUFFIX),
            ),
        }
    }
}

/// The pair of topics a device publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub realtime: String,
    pub recovered: String,
}

/// Builds `{prefix}{sensor_type}/{sensor_id}[/{suffix}]`.
///
/// An empty suffix is treated as no suffix.
pub fn full_topic(
    prefix: &str,
    sensor_type: &str,
    sensor_id: &str,
    suffix: Option<&str>,
) -> String {
    match suffix.filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{prefix}{sensor_type}/{sensor_id}/{suffix}"),
        None => format!("{prefix}{sensor_type}/{sensor_id}"),
    }
}
