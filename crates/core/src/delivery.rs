// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The measurement delivery state machine.
//!
//! One [`DeliveryMachine::tick`] per loop period:
//!
//! 1. Roll the logging period when the clock minute changed.
//! 2. If the network link is down, try to bring it up (rate limited). If
//!    it stays down, buffer this period's reading and end the tick.
//! 3. If the broker session is down, reconnect. On failure buffer and end
//!    the tick; on success start a new connection epoch and subscribe to
//!    the echo topics again.
//! 4. Run the recovery sweep once per connection epoch, repeating it on
//!    later ticks until one sweep completes.
//! 5. Measure and publish this period's reading, waiting for its echo.
//!    Without an echo the reading is buffered instead.
//! 6. Drain whatever the channel has queued.
//!
//! At most one reading is produced per period, whichever path it takes.

use chrono::{DateTime, Utc};

use crate::ack::{await_ack, AckKey, AckState, AckTracker};
use crate::buffer::{BatchBuffer, BatchId};
use crate::channel::{DeliveryChannel, Qos};
use crate::clock::{elapsed_ms, Clock};
use crate::config::DeliveryConfig;
use crate::error::Result;
use crate::identity::{DeviceIdentity, Topics};
use crate::link::NetworkLink;
use crate::payload::Payload;
use crate::reading::Reading;
use crate::recovery::{RecoveryReport, Sweep};
use crate::sensor::TemperatureSensor;
use crate::storage::Storage;

/// Why a reading went to the buffer instead of the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferReason {
    LinkDown,
    BrokerDown,
    PublishFailed,
    AckTimeout,
}

/// The path a tick took for this period's reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickPath {
    /// Published and echoed.
    Published { sequence: u32 },
    /// Appended to the buffer.
    Buffered {
        batch: BatchId,
        sequence: u32,
        reason: BufferReason,
    },
    /// The buffer write failed and the reading is lost.
    BufferFailed { sequence: u32, reason: BufferReason },
    /// This period already has its reading.
    AlreadyLogged,
    /// The sensor read failed; the period stays open for the next tick.
    SensorFailed,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub path: TickPath,
    /// Set when a recovery sweep ran this tick.
    pub recovery: Option<RecoveryReport>,
}

/// Loop state carried between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryState {
    /// Minutes since the epoch of the current logging period.
    pub last_period: Option<i64>,
    pub logged_this_period: bool,
    pub recovered_this_connection: bool,
    /// Sequence number of the next reading. Starts at 0 on every boot.
    pub sequence: u32,
    last_link_attempt_ms: Option<u64>,
}

/// Orchestrates measure, publish-or-buffer and recovery.
pub struct DeliveryMachine<S, C, N, T, K>
where
    S: Storage,
    C: DeliveryChannel,
    N: NetworkLink,
    T: TemperatureSensor,
    K: Clock,
{
    topics: Topics,
    config: DeliveryConfig,
    buffer: BatchBuffer<S>,
    channel: C,
    link: N,
    sensor: T,
    clock: K,
    tracker: AckTracker,
    state: DeliveryState,
}

impl<S, C, N, T, K> DeliveryMachine<S, C, N, T, K>
where
    S: Storage,
    C: DeliveryChannel,
    N: NetworkLink,
    T: TemperatureSensor,
    K: Clock,
{
    /// Creates a machine. Fails if `config` does not validate.
    pub fn new(
        identity: &DeviceIdentity,
        config: DeliveryConfig,
        storage: S,
        channel: C,
        link: N,
        sensor: T,
        clock: K,
    ) -> Result<Self> {
        config.validate()?;
        Ok(DeliveryMachine {
            topics: identity.topics(),
            buffer: BatchBuffer::new(storage, config.rotation_cap),
            config,
            channel,
            link,
            sensor,
            clock,
            tracker: AckTracker::new(),
            state: DeliveryState::default(),
        })
    }

    pub fn state(&self) -> &DeliveryState {
        &self.state
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn ack_state(&self) -> AckState {
        self.tracker.state()
    }

    pub fn buffer(&self) -> &BatchBuffer<S> {
        &self.buffer
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn link_mut(&mut self) -> &mut N {
        &mut self.link
    }

    pub fn sensor_mut(&mut self) -> &mut T {
        &mut self.sensor
    }

    /// Runs ticks forever, one per tick interval.
    pub fn run(&mut self) -> ! {
        tracing::info!(
            realtime = %self.topics.realtime,
            recovered = %self.topics.recovered,
            "delivery loop started"
        );
        loop {
            self.tick();
            self.clock.sleep(self.config.tick_interval());
        }
    }

    /// Runs one loop iteration. Never fails; every failure turns into a
    /// buffering decision or a retry on a later tick.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        self.roll_period(&now);

        if !self.ensure_link() {
            return self.offline(&now, BufferReason::LinkDown);
        }
        if !self.ensure_broker() {
            return self.offline(&now, BufferReason::BrokerDown);
        }

        let mut recovery = None;
        if !self.state.recovered_this_connection && self.channel.is_connected() {
            let report = Sweep {
                buffer: &mut self.buffer,
                channel: &mut self.channel,
                clock: &self.clock,
                tracker: &mut self.tracker,
                topic: &self.topics.recovered,
                config: &self.config,
            }
            .run();
            self.state.recovered_this_connection = report.is_complete();
            recovery = Some(report);
        }

        let path = if self.state.logged_this_period {
            TickPath::AlreadyLogged
        } else {
            self.publish_reading(&now)
        };

        for msg in self.channel.poll() {
            tracing::debug!(
                topic = %msg.topic,
                retain = msg.retain,
                "dropping unsolicited message"
            );
        }

        TickReport { path, recovery }
    }

    fn roll_period(&mut self, now: &DateTime<Utc>) {
        let period = now.timestamp().div_euclid(60);
        if self.state.last_period != Some(period) {
            self.state.last_period = Some(period);
            self.state.logged_this_period = false;
        }
    }

    /// Returns true if the link is up, reconnecting when due.
    fn ensure_link(&mut self) -> bool {
        if self.link.is_up() {
            return true;
        }

        let due = match self.state.last_link_attempt_ms {
            None => true,
            Some(last) => elapsed_ms(&self.clock, last) > self.config.reconnect_interval_ms,
        };
        if due {
            self.state.last_link_attempt_ms = Some(self.clock.monotonic_ms());
            tracing::info!("network link down, reconnecting");
            if let Err(e) = self.link.connect(self.config.link_connect_timeout()) {
                tracing::warn!("link reconnect failed: {e}");
            }
        }
        self.link.is_up()
    }

    /// Returns true if the broker session is up, reconnecting if needed.
    fn ensure_broker(&mut self) -> bool {
        if self.channel.is_connected() {
            return true;
        }

        tracing::info!("broker not connected, reconnecting");
        if let Err(e) = self.channel.connect(self.config.broker_connect_timeout()) {
            tracing::warn!("broker reconnect failed: {e}");
            return false;
        }
        tracing::info!("broker reconnected");
        self.state.recovered_this_connection = false;

        for topic in [&self.topics.realtime, &self.topics.recovered] {
            if let Err(e) = self.channel.subscribe(topic, Qos::AtLeastOnce) {
                tracing::warn!(topic = %topic, "echo subscription failed: {e}");
            }
        }
        true
    }

    /// Buffers this period's reading while offline.
    fn offline(&mut self, now: &DateTime<Utc>, reason: BufferReason) -> TickReport {
        let path = if self.state.logged_this_period {
            TickPath::AlreadyLogged
        } else {
            match self.measure(now) {
                Some(reading) => self.buffer_reading(now, reading, reason),
                None => TickPath::SensorFailed,
            }
        };
        TickReport {
            path,
            recovery: None,
        }
    }

    fn measure(&mut self, now: &DateTime<Utc>) -> Option<Reading> {
        match self.sensor.read_celsius() {
            Ok(value) => Some(Reading::new(now.timestamp(), value, self.state.sequence)),
            Err(e) => {
                tracing::warn!("sensor read failed, retrying next tick: {e}");
                None
            }
        }
    }

    fn publish_reading(&mut self, now: &DateTime<Utc>) -> TickPath {
        let Some(reading) = self.measure(now) else {
            return TickPath::SensorFailed;
        };

        let bytes = match Payload::reading(&reading).to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(sequence = reading.sequence, "failed to encode reading: {e}");
                return self.buffer_reading(now, reading, BufferReason::PublishFailed);
            }
        };

        let topic = &self.topics.realtime;
        self.tracker.begin(topic, AckKey::Sequence(reading.sequence));
        tracing::info!(
            topic = %topic,
            sequence = reading.sequence,
            value = reading.value,
            "publishing reading"
        );
        if let Err(e) = self.channel.publish(topic, &bytes, Qos::AtLeastOnce, false) {
            tracing::warn!(sequence = reading.sequence, "publish failed, buffering: {e}");
            return self.buffer_reading(now, reading, BufferReason::PublishFailed);
        }

        let state = await_ack(
            &mut self.channel,
            &self.clock,
            &mut self.tracker,
            self.config.ack_timeout(),
            self.config.ack_poll_interval(),
        );
        if state != AckState::Acked {
            tracing::warn!(sequence = reading.sequence, "no echo within ack timeout, buffering");
            return self.buffer_reading(now, reading, BufferReason::AckTimeout);
        }

        tracing::info!(sequence = reading.sequence, "reading acknowledged");
        self.finish_period();
        TickPath::Published {
            sequence: reading.sequence,
        }
    }

    fn buffer_reading(
        &mut self,
        now: &DateTime<Utc>,
        reading: Reading,
        reason: BufferReason,
    ) -> TickPath {
        let sequence = reading.sequence;
        let path = match self.buffer.append_reading(now, &reading) {
            Ok(batch) => TickPath::Buffered {
                batch,
                sequence,
                reason,
            },
            Err(e) => {
                tracing::error!(sequence, ?reason, "failed to buffer reading, it is lost: {e}");
                TickPath::BufferFailed { sequence, reason }
            }
        };
        self.finish_period();
        path
    }

    fn finish_period(&mut self) {
        self.state.logged_this_period = true;
        self.state.sequence = self.state.sequence.wrapping_add(1);
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
