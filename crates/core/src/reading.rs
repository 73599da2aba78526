// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A single sensor observation and its buffered line format.
//!
//! Buffered readings are stored one per line as `timestamp,value,sequence`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One temperature observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Degrees Celsius.
    pub value: f32,
    /// Per-run sequence number, used for ack correlation and dedup.
    pub sequence: u32,
}

impl Reading {
    /// Creates a new reading.
    pub fn new(timestamp: i64, value: f32, sequence: u32) -> Self {
        Reading {
            timestamp,
            value,
            sequence,
        }
    }

    /// Returns the buffered line for this reading, including the newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }

    /// Parses a buffered line.
    pub fn parse_line(line: &str) -> Result<Self> {
        line.parse()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.timestamp, self.value, self.sequence)
    }
}

impl FromStr for Reading {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(',').map(str::trim);

        let (Some(ts), Some(value), Some(seq)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::MalformedRecord(line.to_string()));
        };

        let malformed = || Error::MalformedRecord(line.to_string());
        let timestamp = ts.parse::<i64>().map_err(|_| malformed())?;
        let value = value.parse::<f32>().map_err(|_| malformed())?;
        let sequence = seq.parse::<u32>().map_err(|_| malformed())?;

        Ok(Reading::new(timestamp, value, sequence))
    }
}

#[cfg(test)]
#[path = "reading_tests.rs"]
mod tests;
