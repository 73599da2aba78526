// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use super::*;
use crate::recovery::BatchOutcome;
use crate::storage::MemStorage;
use crate::test_helpers::{FlakyStorage, MockChannel, MockClock, MockLink, MockSensor, Reply};

type Machine<'a, S = MemStorage> =
    DeliveryMachine<S, MockChannel, MockLink, MockSensor, &'a MockClock>;

const NOW: &str = "2025-07-26T14:55:00Z";

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("lab/", "temp", "s1")
}

fn machine_with<S: Storage>(
    clock: &MockClock,
    storage: S,
    channel: MockChannel,
    link: MockLink,
    config: DeliveryConfig,
) -> DeliveryMachine<S, MockChannel, MockLink, MockSensor, &MockClock> {
    DeliveryMachine::new(
        &identity(),
        config,
        storage,
        channel,
        link,
        MockSensor::constant(21.5),
        clock,
    )
    .unwrap()
}

fn machine(clock: &MockClock, channel: MockChannel) -> Machine<'_> {
    machine_with(clock, MemStorage::new(), channel, MockLink::up(), DeliveryConfig::default())
}

fn buffered_readings<S: Storage>(
    m: &Machine<'_, S>,
    now: &DateTime<Utc>,
) -> Vec<(String, Vec<Reading>)> {
    m.buffer()
        .list_batches(now)
        .into_iter()
        .map(|id| {
            let readings = m.buffer().read_batch(&id).unwrap();
            (id.to_string(), readings)
        })
        .collect()
}

#[test]
fn invalid_config_rejected() {
    let clock = MockClock::at(NOW);
    let config = DeliveryConfig {
        rotation_cap: 0,
        ..DeliveryConfig::default()
    };
    let result = DeliveryMachine::new(
        &identity(),
        config,
        MemStorage::new(),
        MockChannel::echoing(),
        MockLink::up(),
        MockSensor::constant(21.5),
        &clock,
    );
    assert!(result.is_err());
}

#[test]
fn acked_reading_is_published() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());

    let report = m.tick();

    assert_eq!(report.path, TickPath::Published { sequence: 0 });
    assert_eq!(m.state().sequence, 1);
    assert!(m.state().logged_this_period);
    assert_eq!(m.ack_state(), AckState::Acked);
    assert_eq!(m.buffer().storage().file_count(), 0);

    let published = m.channel().published_to("lab/temp/s1");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["timestamp"], serde_json::json!(1_753_541_700));
    assert_eq!(published[0]["value"], serde_json::json!([21.5]));
    assert_eq!(published[0]["sequence"], serde_json::json!(0));
}

#[test]
fn connect_subscribes_to_both_echo_topics() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());
    m.tick();
    assert_eq!(m.channel().subscriptions, vec!["lab/temp/s1", "lab/temp/s1/recovered"]);
}

#[test]
fn missing_echo_buffers_reading() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::silent());

    let report = m.tick();

    let batch = BatchId::new("2025", "07261455.csv");
    assert_eq!(
        report.path,
        TickPath::Buffered {
            batch,
            sequence: 0,
            reason: BufferReason::AckTimeout,
        }
    );
    assert_eq!(m.ack_state(), AckState::TimedOut);
    assert_eq!(
        buffered_readings(&m, &clock.now()),
        vec![("2025/07261455.csv".to_string(), vec![Reading::new(1_753_541_700, 21.5, 0)])]
    );
    assert_eq!(m.state().sequence, 1);
    assert!(m.state().logged_this_period);
}

#[test]
fn rejected_publish_buffers_reading() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing().script(&[Reply::Reject]));

    let report = m.tick();

    assert!(matches!(
        report.path,
        TickPath::Buffered { sequence: 0, reason: BufferReason::PublishFailed, .. }
    ));
    let batches = buffered_readings(&m, &clock.now());
    assert_eq!(batches[0].1, vec![Reading::new(1_753_541_700, 21.5, 0)]);
}

#[test]
fn retained_echo_does_not_count() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing().script(&[Reply::EchoRetained]));

    let report = m.tick();

    assert!(matches!(report.path, TickPath::Buffered { reason: BufferReason::AckTimeout, .. }));
}

#[test]
fn offline_ticks_rotate_batches() {
    let clock = MockClock::at(NOW);
    let config = DeliveryConfig {
        rotation_cap: 5,
        ..DeliveryConfig::default()
    };
    let mut m = machine_with(
        &clock,
        MemStorage::new(),
        MockChannel::unreachable(),
        MockLink::down(),
        config,
    );

    for _ in 0..6 {
        let report = m.tick();
        assert!(matches!(report.path, TickPath::Buffered { reason: BufferReason::LinkDown, .. }));
        clock.advance(Duration::from_secs(60));
    }

    let batches = buffered_readings(&m, &clock.now());
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].0, "2025/07261455.csv");
    assert_eq!(batches[0].1.len(), 5);
    assert_eq!(batches[1].0, "2025/07261500.csv");
    assert_eq!(batches[1].1.len(), 1);

    let sequences: Vec<u32> = batches
        .iter()
        .flat_map(|(_, r)| r.iter().map(|r| r.sequence))
        .collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn one_reading_per_minute() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());

    assert_eq!(m.tick().path, TickPath::Published { sequence: 0 });
    clock.advance(Duration::from_secs(1));
    assert_eq!(m.tick().path, TickPath::AlreadyLogged);
    clock.set_wall("2025-07-26T14:56:00Z");
    assert_eq!(m.tick().path, TickPath::Published { sequence: 1 });

    assert_eq!(m.sensor_mut().reads, 2);
}

#[test]
fn same_minute_an_hour_later_is_a_new_period() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());

    m.tick();
    clock.set_wall("2025-07-26T15:55:00Z");
    assert_eq!(m.tick().path, TickPath::Published { sequence: 1 });
}

#[test]
fn offline_tick_after_logging_does_not_buffer() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());

    m.tick();
    m.channel_mut().disconnect();
    m.channel_mut().connect_fails = true;
    clock.advance(Duration::from_secs(1));

    assert_eq!(m.tick().path, TickPath::AlreadyLogged);
    assert_eq!(m.buffer().storage().file_count(), 0);
}

#[test]
fn sensor_failure_keeps_period_open() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());
    m.sensor_mut().fail_reads = true;

    assert_eq!(m.tick().path, TickPath::SensorFailed);
    assert!(!m.state().logged_this_period);
    assert_eq!(m.state().sequence, 0);

    m.sensor_mut().fail_reads = false;
    clock.advance(Duration::from_secs(1));
    assert_eq!(m.tick().path, TickPath::Published { sequence: 0 });
}

#[test]
fn buffer_failure_loses_reading_but_closes_period() {
    let clock = MockClock::at(NOW);
    let storage = FlakyStorage {
        fail_appends: true,
        ..FlakyStorage::default()
    };
    let mut m = machine_with(
        &clock,
        storage,
        MockChannel::unreachable(),
        MockLink::up(),
        DeliveryConfig::default(),
    );

    let report = m.tick();

    assert_eq!(
        report.path,
        TickPath::BufferFailed {
            sequence: 0,
            reason: BufferReason::BrokerDown,
        }
    );
    assert!(m.state().logged_this_period);
    assert_eq!(m.state().sequence, 1);
}

#[test]
fn link_reconnect_is_rate_limited() {
    let clock = MockClock::at(NOW);
    let mut m = machine_with(
        &clock,
        MemStorage::new(),
        MockChannel::echoing(),
        MockLink::down(),
        DeliveryConfig::default(),
    );

    for _ in 0..4 {
        m.tick();
        clock.advance(Duration::from_secs(1));
    }

    // Attempts at 0 s and 3 s; 1 s and 2 s are inside the 2 s backoff.
    assert_eq!(m.link_mut().connect_attempts, 2);
    assert_eq!(m.channel().connect_attempts, 0);
}

#[test]
fn link_recovers_then_broker_connects() {
    let clock = MockClock::at(NOW);
    let mut m = machine_with(
        &clock,
        MemStorage::new(),
        MockChannel::echoing(),
        MockLink::down(),
        DeliveryConfig::default(),
    );
    m.link_mut().connect_succeeds = true;

    let report = m.tick();

    assert_eq!(report.path, TickPath::Published { sequence: 0 });
    assert_eq!(m.link_mut().connect_attempts, 1);
    assert_eq!(m.channel().connect_attempts, 1);
}

#[test]
fn outage_is_recovered_after_reconnect() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::unreachable());

    for _ in 0..3 {
        let report = m.tick();
        assert!(matches!(report.path, TickPath::Buffered { reason: BufferReason::BrokerDown, .. }));
        clock.advance(Duration::from_secs(60));
    }

    m.channel_mut().connect_fails = false;
    let report = m.tick();

    let recovery = report.recovery.unwrap();
    assert_eq!(recovery.sent(), 1);
    assert!(recovery.is_complete());
    assert!(m.state().recovered_this_connection);
    assert_eq!(report.path, TickPath::Published { sequence: 3 });

    let recovered = m.channel().published_to("lab/temp/s1/recovered");
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0]["meta"]["s"], serde_json::json!([0, 1, 2]));
    assert_eq!(m.buffer().storage().file_count(), 0);
}

#[test]
fn recovery_runs_once_per_connection() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());

    assert!(m.tick().recovery.is_some());
    clock.advance(Duration::from_secs(60));
    assert!(m.tick().recovery.is_none());

    m.channel_mut().disconnect();
    clock.advance(Duration::from_secs(60));
    let report = m.tick();

    assert!(report.recovery.is_some());
    assert_eq!(m.channel().connect_attempts, 2);
    assert_eq!(m.channel().subscriptions.len(), 2);
}

#[test]
fn partial_recovery_retried_next_tick() {
    let clock = MockClock::at(NOW);
    let mut storage = MemStorage::new();
    storage.create_dir("2025").unwrap();
    storage.append("2025/07261430.csv", "1753540200,21.5,0\n").unwrap();
    let channel = MockChannel::echoing().script(&[Reply::Silent]);
    let mut m = machine_with(&clock, storage, channel, MockLink::up(), DeliveryConfig::default());

    let first = m.tick().recovery.unwrap();
    assert_eq!(first.batches[0].outcome, BatchOutcome::AckTimeout);
    assert!(!m.state().recovered_this_connection);

    clock.advance(Duration::from_secs(1));
    let second = m.tick().recovery.unwrap();
    assert_eq!(second.sent(), 1);
    assert!(m.state().recovered_this_connection);
}

#[test]
fn sequence_wraps_on_overflow() {
    let clock = MockClock::at(NOW);
    let mut m = machine(&clock, MockChannel::echoing());
    m.state.sequence = u32::MAX;

    assert_eq!(m.tick().path, TickPath::Published { sequence: u32::MAX });
    assert_eq!(m.state().sequence, 0);
}
