// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tl-core: Delivery core for the thermolog sensor daemon
//!
//! This crate provides the reading buffer, the acknowledgment tracker, the
//! recovery sweep and the per-tick delivery state machine, along with the
//! collaborator traits the thermologd daemon implements for real hardware.

pub mod ack;
pub mod buffer;
pub mod channel;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod identity;
pub mod link;
pub mod payload;
pub mod reading;
pub mod recovery;
pub mod sensor;
pub mod storage;

#[cfg(test)]
mod test_helpers;

pub use ack::{AckKey, AckState, AckTracker};
pub use buffer::{BatchBuffer, BatchId};
pub use channel::{DeliveryChannel, InboundMessage, Qos};
pub use clock::{Clock, SystemClock};
pub use config::DeliveryConfig;
pub use delivery::{BufferReason, DeliveryMachine, DeliveryState, TickPath, TickReport};
pub use error::{Error, Result};
pub use identity::{DeviceIdentity, Topics};
pub use link::NetworkLink;
pub use payload::Payload;
pub use reading::Reading;
pub use recovery::{BatchOutcome, RecoveryReport};
pub use sensor::TemperatureSensor;
pub use storage::{FsStorage, MemStorage, Storage};
