// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Timing and sizing knobs of the delivery loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Delivery loop configuration. Every field has a default, so an empty
/// `[delivery]` section is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Fixed period of the main loop.
    pub tick_interval_ms: u64,
    /// Minimum spacing between network link reconnect attempts.
    pub reconnect_interval_ms: u64,
    pub link_connect_timeout_ms: u64,
    pub broker_connect_timeout_ms: u64,
    /// Echo wait for a real-time reading.
    pub ack_timeout_ms: u64,
    /// Echo wait for a recovered batch.
    pub recovery_ack_timeout_ms: u64,
    /// Sleep between channel polls while waiting for an echo.
    pub ack_poll_interval_ms: u64,
    /// Wall-clock ceiling of one recovery sweep.
    pub recovery_budget_ms: u64,
    /// Lines per batch file before a new one is started.
    pub rotation_cap: usize,
    /// Largest recovery payload, in bytes.
    pub max_recovery_payload_bytes: usize,
    /// Batches attempted per sweep; 0 means no limit.
    pub max_batches_per_sweep: usize,
    /// Delete batches older than 24 hours at the start of each sweep.
    pub prune_stale_batches: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            tick_interval_ms: 1000,
            reconnect_interval_ms: 2000,
            link_connect_timeout_ms: 15_000,
            broker_connect_timeout_ms: 10_000,
            ack_timeout_ms: 5000,
            recovery_ack_timeout_ms: 15_000,
            ack_poll_interval_ms: 50,
            recovery_budget_ms: 60_000,
            rotation_cap: 20,
            max_recovery_payload_bytes: 2048,
            max_batches_per_sweep: 0,
            prune_stale_batches: false,
        }
    }
}

impl DeliveryConfig {
    /// Rejects values that would stall the loop or the buffer.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_cap == 0 {
            return Err(Error::InvalidConfig("rotation_cap must be at least 1".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::InvalidConfig("tick_interval_ms must be positive".to_string()));
        }
        if self.ack_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("ack_poll_interval_ms must be positive".to_string()));
        }
        if self.max_recovery_payload_bytes == 0 {
            return Err(Error::InvalidConfig(
                "max_recovery_payload_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn link_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.link_connect_timeout_ms)
    }

    pub fn broker_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_connect_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn recovery_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_ack_timeout_ms)
    }

    pub fn ack_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ack_poll_interval_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
