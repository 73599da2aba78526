// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles for the collaborator traits.

#![allow(clippy::unwrap_used)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::channel::{DeliveryChannel, InboundMessage, Qos};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::link::NetworkLink;
use crate::sensor::TemperatureSensor;
use crate::storage::{MemStorage, Storage};

/// Parses an RFC 3339 timestamp.
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Clock whose `sleep` advances time instead of blocking.
#[derive(Debug)]
pub struct MockClock {
    now: Cell<DateTime<Utc>>,
    mono_ms: Cell<u64>,
}

impl MockClock {
    pub fn at(s: &str) -> Self {
        MockClock {
            now: Cell::new(at(s)),
            mono_ms: Cell::new(1_000_000),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let chrono_duration = chrono::Duration::from_std(duration).unwrap();
        self.now.set(self.now.get() + chrono_duration);
        self.mono_ms.set(self.mono_ms.get() + duration.as_millis() as u64);
    }

    /// Moves the wall clock without touching the monotonic counter.
    pub fn set_wall(&self, s: &str) {
        self.now.set(at(s));
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn monotonic_ms(&self) -> u64 {
        self.mono_ms.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// In-memory storage with switchable write and remove failures.
#[derive(Debug, Default)]
pub struct FlakyStorage {
    pub inner: MemStorage,
    pub fail_appends: bool,
    pub fail_removes: bool,
}

impl Storage for FlakyStorage {
    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        self.inner.create_dir(path)
    }

    fn append(&mut self, path: &str, data: &str) -> Result<()> {
        if self.fail_appends {
            return Err(Error::Storage(format!("write failed: {path}")));
        }
        self.inner.append(path, data)
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        self.inner.read_to_string(path)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        self.inner.list_dir(path)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        if self.fail_removes {
            return Err(Error::Storage(format!("remove failed: {path}")));
        }
        self.inner.remove(path)
    }
}

/// Sensor returning scripted values, then a fixed default.
#[derive(Debug)]
pub struct MockSensor {
    pub values: VecDeque<f32>,
    pub default_value: f32,
    pub fail_reads: bool,
    pub reads: usize,
}

impl MockSensor {
    pub fn constant(value: f32) -> Self {
        MockSensor {
            values: VecDeque::new(),
            default_value: value,
            fail_reads: false,
            reads: 0,
        }
    }
}

impl TemperatureSensor for MockSensor {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_celsius(&mut self) -> Result<f32> {
        self.reads += 1;
        if self.fail_reads {
            return Err(Error::Sensor("read failed".to_string()));
        }
        Ok(self.values.pop_front().unwrap_or(self.default_value))
    }
}

/// Network link with a switchable state.
#[derive(Debug)]
pub struct MockLink {
    pub up: bool,
    pub connect_succeeds: bool,
    pub connect_attempts: usize,
}

impl MockLink {
    pub fn up() -> Self {
        MockLink {
            up: true,
            connect_succeeds: true,
            connect_attempts: 0,
        }
    }

    pub fn down() -> Self {
        MockLink {
            up: false,
            connect_succeeds: false,
            connect_attempts: 0,
        }
    }
}

impl NetworkLink for MockLink {
    fn is_up(&self) -> bool {
        self.up
    }

    fn connect(&mut self, _timeout: Duration) -> Result<()> {
        self.connect_attempts += 1;
        if self.connect_succeeds {
            self.up = true;
            Ok(())
        } else {
            Err(Error::ConnectFailed("link unavailable".to_string()))
        }
    }
}

/// How the mock broker answers one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Accept and echo the payload back to subscribers.
    Echo,
    /// Accept and echo it flagged as retained.
    EchoRetained,
    /// Accept without echoing.
    Silent,
    /// Refuse the publish.
    Reject,
}

/// Broker double. Accepted publishes are echoed on the next `poll`.
#[derive(Debug)]
pub struct MockChannel {
    pub connected: bool,
    pub connect_fails: bool,
    pub connect_attempts: usize,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: VecDeque<InboundMessage>,
    pub default_reply: Reply,
    pub script: VecDeque<Reply>,
}

impl MockChannel {
    /// A broker that accepts and echoes everything.
    pub fn echoing() -> Self {
        MockChannel {
            connected: false,
            connect_fails: false,
            connect_attempts: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbound: VecDeque::new(),
            default_reply: Reply::Echo,
            script: VecDeque::new(),
        }
    }

    /// A broker that accepts everything and never echoes.
    pub fn silent() -> Self {
        MockChannel {
            default_reply: Reply::Silent,
            ..Self::echoing()
        }
    }

    /// A broker that cannot be reached.
    pub fn unreachable() -> Self {
        MockChannel {
            connect_fails: true,
            ..Self::echoing()
        }
    }

    /// Queues replies for the next publishes.
    pub fn script(mut self, replies: &[Reply]) -> Self {
        self.script.extend(replies.iter().copied());
        self
    }

    /// Payloads published to `topic`, in order.
    pub fn published_to(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| serde_json::from_slice(p).unwrap())
            .collect()
    }

    /// Drops the broker session, as a network outage would.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl DeliveryChannel for MockChannel {
    fn connect(&mut self, _timeout: Duration) -> Result<()> {
        self.connect_attempts += 1;
        if self.connect_fails {
            return Err(Error::ConnectFailed("broker unreachable".to_string()));
        }
        self.connected = true;
        self.subscriptions.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], _qos: Qos, _retain: bool) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        let reply = self.script.pop_front().unwrap_or(self.default_reply);
        if reply == Reply::Reject {
            return Err(Error::PublishFailed {
                topic: topic.to_string(),
                reason: "rejected".to_string(),
            });
        }
        self.published.push((topic.to_string(), payload.to_vec()));

        let subscribed = self.subscriptions.iter().any(|s| s == topic);
        match reply {
            Reply::Echo if subscribed => {
                self.inbound.push_back(InboundMessage::new(topic, false, payload));
            }
            Reply::EchoRetained if subscribed => {
                self.inbound.push_back(InboundMessage::new(topic, true, payload));
            }
            _ => {}
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: Qos) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if !self.subscriptions.iter().any(|s| s == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        self.inbound.drain(..).collect()
    }
}
