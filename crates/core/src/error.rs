// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tl-core operations.

use thiserror::Error;

/// All possible errors that can occur in tl-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record: '{0}'")]
    MalformedRecord(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not connected to broker")]
    NotConnected,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("publish to '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("subscribe to '{topic}' failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("sensor error: {0}")]
    Sensor(String),

    #[error("payload of {size} bytes exceeds the {limit} byte ceiling")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid config: {0}\n  hint: check the [delivery] section of the config file")]
    InvalidConfig(String),
}

/// A specialized Result type for tl-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
