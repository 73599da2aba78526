// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Thermal zone sensor backed by a sysfs file.

use std::fs;
use std::path::PathBuf;

use tl_core::{Error, Result, TemperatureSensor};

/// Reads a Linux thermal zone, which reports millidegrees Celsius as an
/// integer, e.g. `21500`.
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ThermalZoneSensor { path: path.into() }
    }
}

impl TemperatureSensor for ThermalZoneSensor {
    fn init(&mut self) -> Result<()> {
        let celsius = self.read_celsius().map_err(|e| {
            Error::Sensor(format!("no usable sensor at {}: {}", self.path.display(), e))
        })?;
        tracing::info!(path = %self.path.display(), celsius, "sensor ready");
        Ok(())
    }

    fn read_celsius(&mut self) -> Result<f32> {
        let raw = fs::read_to_string(&self.path)?;
        let millis: i64 = raw
            .trim()
            .parse()
            .map_err(|_| Error::Sensor(format!("unexpected reading '{}'", raw.trim())))?;
        Ok(millis as f32 / 1000.0)
    }
}

#[cfg(test)]
#[path = "sensor_tests.rs"]
mod tests;
