// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Application-level acknowledgment of publishes.
//!
//! The device subscribes to its own topics, so every publish the broker
//! accepts comes back as an echo. A publish counts as delivered once its
//! echo is seen: same topic, not a retained replay, and carrying the
//! sequence number (or, for a recovered batch, the sequence list) that was
//! sent.
//!
//! ```text
//! Idle --begin--> AwaitingAck --matching echo--> Acked
//!                      |
//!                      +--------timeout--------> TimedOut
//! ```

use std::time::Duration;

use crate::channel::{DeliveryChannel, InboundMessage};
use crate::clock::{elapsed_ms, Clock};
use crate::payload::{echo_batch_sequences, echo_sequence};

/// State of the in-flight publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    Idle,
    AwaitingAck,
    Acked,
    TimedOut,
}

/// What an echo must carry to acknowledge the in-flight publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckKey {
    /// The `sequence` field of a real-time reading.
    Sequence(u32),
    /// The `meta.s` list of a recovered batch.
    Batch(Vec<u32>),
}

impl AckKey {
    fn matches(&self, payload: &[u8]) -> bool {
        match self {
            AckKey::Sequence(expected) => echo_sequence(payload) == Some(*expected),
            AckKey::Batch(expected) => {
                echo_batch_sequences(payload).is_some_and(|seen| &seen == expected)
            }
        }
    }
}

/// Correlates inbound echoes with the single in-flight publish.
#[derive(Debug)]
pub struct AckTracker {
    state: AckState,
    topic: String,
    key: Option<AckKey>,
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AckTracker {
    pub fn new() -> Self {
        AckTracker {
            state: AckState::Idle,
            topic: String::new(),
            key: None,
        }
    }

    pub fn state(&self) -> AckState {
        self.state
    }

    /// Starts waiting for the echo of a publish to `topic`.
    ///
    /// Overwrites whatever the previous publish left behind.
    pub fn begin(&mut self, topic: &str, key: AckKey) {
        self.topic = topic.to_string();
        self.key = Some(key);
        self.state = AckState::AwaitingAck;
    }

    /// Feeds one inbound message. Returns true if it acknowledged the
    /// in-flight publish.
    pub fn observe(&mut self, msg: &InboundMessage) -> bool {
        if self.state != AckState::AwaitingAck {
            return false;
        }
        if msg.retain || msg.topic != self.topic {
            return false;
        }
        let Some(key) = &self.key else {
            return false;
        };
        if !key.matches(&msg.payload) {
            tracing::debug!(topic = %msg.topic, "echo does not match in-flight publish");
            return false;
        }
        self.state = AckState::Acked;
        true
    }

    /// Gives up on the in-flight publish.
    pub fn expire(&mut self) {
        if self.state == AckState::AwaitingAck {
            self.state = AckState::TimedOut;
        }
    }
}

/// Polls `channel` until the tracker resolves or `timeout` elapses.
///
/// Returns the terminal state, `Acked` or `TimedOut`. Messages that do not
/// acknowledge the publish are dropped.
pub fn await_ack<C, K>(
    channel: &mut C,
    clock: &K,
    tracker: &mut AckTracker,
    timeout: Duration,
    poll_interval: Duration,
) -> AckState
where
    C: DeliveryChannel + ?Sized,
    K: Clock + ?Sized,
{
    let start = clock.monotonic_ms();
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

    loop {
        for msg in channel.poll() {
            tracker.observe(&msg);
        }
        if tracker.state() == AckState::Acked {
            return AckState::Acked;
        }
        if elapsed_ms(clock, start) >= timeout_ms {
            tracker.expire();
            return tracker.state();
        }
        clock.sleep(poll_interval);
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
