// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery channel abstraction (broker transport).
//!
//! Inbound messages are not pushed through a callback: the channel buffers
//! them and hands them over when [`DeliveryChannel::poll`] is called, so the
//! delivery loop only makes progress at its own poll points.

use std::time::Duration;

use crate::error::Result;

/// Quality of service for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    /// QoS 0: at most once.
    AtMostOnce,
    /// QoS 1: at least once.
    AtLeastOnce,
}

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    /// Set when the broker delivered a retained message on subscribe.
    pub retain: bool,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, retain: bool, payload: impl Into<Vec<u8>>) -> Self {
        InboundMessage {
            topic: topic.into(),
            retain,
            payload: payload.into(),
        }
    }
}

/// Broker connection used by the delivery loop.
pub trait DeliveryChannel {
    /// Connects to the broker, giving up after `timeout`.
    fn connect(&mut self, timeout: Duration) -> Result<()>;

    /// Returns true while the broker session is up.
    fn is_connected(&self) -> bool;

    /// Publishes `payload` to `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<()>;

    /// Subscribes to `topic`.
    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<()>;

    /// Services the connection and drains messages received since the
    /// last call.
    fn poll(&mut self) -> Vec<InboundMessage>;
}
