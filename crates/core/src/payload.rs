// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON wire payloads.
//!
//! Real-time reading:
//!
//! ```text
//! {"timestamp":1753541700,"value":[21.5],"sequence":0,"meta":null}
//! ```
//!
//! Recovered batch, stamped with the recovery time:
//!
//! ```text
//! {"timestamp":1753545300,"value":[null],"sequence":null,
//!  "meta":{"t":[1753541700,1753541760],"v":[21.5,21.25],"s":[0,1]}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::reading::Reading;

/// Column arrays of a recovered batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMeta {
    /// Timestamps.
    pub t: Vec<i64>,
    /// Values.
    pub v: Vec<f32>,
    /// Sequence numbers.
    pub s: Vec<u32>,
}

/// A message published to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub timestamp: i64,
    pub value: Vec<Option<f32>>,
    pub sequence: Option<u32>,
    pub meta: Option<RecoveryMeta>,
}

impl Payload {
    /// Payload for a single real-time reading.
    pub fn reading(reading: &Reading) -> Self {
        Payload {
            timestamp: reading.timestamp,
            value: vec![Some(reading.value)],
            sequence: Some(reading.sequence),
            meta: None,
        }
    }

    /// Aggregate payload for a recovered batch.
    pub fn recovery(recovered_at: i64, readings: &[Reading]) -> Self {
        Payload {
            timestamp: recovered_at,
            value: vec![None],
            sequence: None,
            meta: Some(RecoveryMeta {
                t: readings.iter().map(|r| r.timestamp).collect(),
                v: readings.iter().map(|r| r.value).collect(),
                s: readings.iter().map(|r| r.sequence).collect(),
            }),
        }
    }

    /// Serializes to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Serializes to JSON bytes, failing if the result exceeds `limit` bytes.
    pub fn to_bytes_within(&self, limit: usize) -> Result<Vec<u8>> {
        let bytes = self.to_bytes()?;
        if bytes.len() > limit {
            return Err(Error::PayloadTooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }
}

/// Extracts the integer `sequence` field of an echoed payload.
///
/// Returns `None` for non-JSON payloads, a missing field, `null`, or a
/// value that is not a non-negative integer.
pub fn echo_sequence(payload: &[u8]) -> Option<u32> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    match value.get("sequence")? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extracts the `meta.s` sequence list of an echoed recovery payload.
pub fn echo_batch_sequences(payload: &[u8]) -> Option<Vec<u32>> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    value
        .get("meta")?
        .get("s")?
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
        .collect()
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
