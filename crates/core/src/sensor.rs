// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Measurement source.

use crate::error::Result;

/// A temperature sensor.
pub trait TemperatureSensor {
    /// Prepares the hardware. Fails if the sensor is absent.
    fn init(&mut self) -> Result<()>;

    /// Takes one measurement in degrees Celsius.
    fn read_celsius(&mut self) -> Result<f32>;
}
