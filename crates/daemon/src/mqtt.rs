// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT delivery channel over the blocking `rumqttc` client.
//!
//! `rumqttc` only moves bytes while its connection is being iterated, so
//! publishes are queued by [`DeliveryChannel::publish`] and actually leave
//! the host during the next [`DeliveryChannel::poll`]. The ack wait polls
//! in a loop, which is what flushes the publish and collects its echo.

use std::time::{Duration, Instant};

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use tl_core::{DeliveryChannel, DeviceIdentity, Error, InboundMessage, Qos, Result};

use crate::config::BrokerConfig;

/// Requests buffered between the client handle and its connection.
const REQUEST_CAPACITY: usize = 32;
/// How long one `poll` waits for the next network event.
const POLL_SLICE: Duration = Duration::from_millis(5);
/// Shortest keep-alive `rumqttc` accepts.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

pub struct MqttChannel {
    options: MqttOptions,
    session: Option<(Client, Connection)>,
    connected: bool,
}

impl MqttChannel {
    pub fn new(identity: &DeviceIdentity, broker: &BrokerConfig) -> Self {
        MqttChannel {
            options: build_options(identity, broker),
            session: None,
            connected: false,
        }
    }

    fn client(&self) -> Result<&Client> {
        match &self.session {
            Some((client, _)) if self.connected => Ok(client),
            _ => Err(Error::NotConnected),
        }
    }
}

/// Connection options for a device.
pub fn build_options(identity: &DeviceIdentity, broker: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(identity.client_id(), broker.host.clone(), broker.port);
    options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs).max(MIN_KEEP_ALIVE));
    options.set_clean_session(true);
    if let (Some(user), Some(pass)) = (&broker.username, &broker.password) {
        options.set_credentials(user.clone(), pass.clone());
    }
    options
}

pub fn to_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

impl DeliveryChannel for MqttChannel {
    fn connect(&mut self, timeout: Duration) -> Result<()> {
        self.session = None;
        self.connected = false;

        let (host, port) = self.options.broker_address();
        tracing::info!(
            host = %host,
            port,
            client_id = %self.options.client_id(),
            "connecting to broker"
        );

        let (client, mut connection) = Client::new(self.options.clone(), REQUEST_CAPACITY);
        let no_connack = || {
            Error::ConnectFailed(format!("no CONNACK from {host}:{port} within {timeout:?}"))
        };
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(no_connack());
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => break,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(Error::ConnectFailed(format!("{host}:{port}: {e}"))),
                Err(_) => return Err(no_connack()),
            }
        }

        self.session = Some((client, connection));
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<()> {
        self.client()?
            .try_publish(topic, to_qos(qos), retain, payload.to_vec())
            .map_err(|e| Error::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<()> {
        self.client()?
            .try_subscribe(topic, to_qos(qos))
            .map_err(|e| Error::SubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        let mut inbound = Vec::new();
        let Some((_, connection)) = self.session.as_mut() else {
            return inbound;
        };

        loop {
            match connection.recv_timeout(POLL_SLICE) {
                Ok(Ok(Event::Incoming(Packet::Publish(p)))) => {
                    tracing::debug!(topic = %p.topic, bytes = p.payload.len(), "message received");
                    inbound.push(InboundMessage::new(
                        p.topic.clone(),
                        p.retain,
                        p.payload.to_vec(),
                    ));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    tracing::warn!("broker closed the session");
                    self.connected = false;
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("broker connection lost: {e}");
                    self.connected = false;
                    break;
                }
                Err(_) => break,
            }
        }

        if !self.connected {
            self.session = None;
        }
        inbound
    }
}

#[cfg(test)]
#[path = "mqtt_tests.rs"]
mod tests;
