// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery sweep: drains buffered batches after a reconnect.
//!
//! Each batch is published as one aggregate payload to the `/recovered`
//! topic and deleted only once its echo comes back. Batches that fail stay
//! in place untouched for the next sweep.

use chrono::{DateTime, Utc};

use crate::ack::{await_ack, AckKey, AckState, AckTracker};
use crate::buffer::{BatchBuffer, BatchId};
use crate::channel::{DeliveryChannel, Qos};
use crate::clock::{elapsed_ms, Clock};
use crate::config::DeliveryConfig;
use crate::error::Error;
use crate::payload::Payload;
use crate::storage::Storage;

/// What happened to one batch during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Published, acknowledged and deleted.
    Sent { readings: usize },
    /// No well-formed lines. Skipped, not a failure.
    Empty,
    /// The batch could not be read.
    ReadFailed,
    /// The aggregate payload exceeds the size ceiling.
    TooLarge { size: usize },
    /// The channel refused the publish.
    PublishFailed,
    /// No matching echo within the recovery ack timeout.
    AckTimeout,
    /// Acknowledged, but the batch could not be removed. It will be sent
    /// again by a later sweep.
    DeleteFailed,
}

impl BatchOutcome {
    /// Returns true if the batch is left for a later sweep.
    pub fn is_failure(&self) -> bool {
        !matches!(self, BatchOutcome::Sent { .. } | BatchOutcome::Empty)
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub batch: BatchId,
    pub outcome: BatchOutcome,
}

/// Result of one recovery sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Batches attempted, in the order they were processed.
    pub batches: Vec<BatchResult>,
    /// Set when the time budget or batch limit left batches unattempted.
    pub aborted: bool,
    /// Stale batches deleted before the sweep.
    pub pruned: usize,
}

impl RecoveryReport {
    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Sent { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == BatchOutcome::Empty)
    }

    pub fn failed(&self) -> usize {
        self.count(BatchOutcome::is_failure)
    }

    /// True when every listed batch was sent or skipped.
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.failed() == 0
    }

    fn count(&self, f: impl Fn(&BatchOutcome) -> bool) -> usize {
        self.batches.iter().filter(|b| f(&b.outcome)).count()
    }
}

/// Everything one sweep touches, borrowed from the delivery machine.
pub struct Sweep<'a, S: Storage, C: DeliveryChannel + ?Sized, K: Clock + ?Sized> {
    pub buffer: &'a mut BatchBuffer<S>,
    pub channel: &'a mut C,
    pub clock: &'a K,
    pub tracker: &'a mut AckTracker,
    /// The `/recovered` topic.
    pub topic: &'a str,
    pub config: &'a DeliveryConfig,
}

impl<S, C, K> Sweep<'_, S, C, K>
where
    S: Storage,
    C: DeliveryChannel + ?Sized,
    K: Clock + ?Sized,
{
    /// Runs the sweep over every recoverable batch, oldest first.
    pub fn run(mut self) -> RecoveryReport {
        let start = self.clock.monotonic_ms();
        let now = self.clock.now();
        let mut report = RecoveryReport::default();

        if self.config.prune_stale_batches {
            report.pruned = self.buffer.prune_stale(&now);
            if report.pruned > 0 {
                tracing::info!(pruned = report.pruned, "pruned stale batches");
            }
        }

        let batches = self.buffer.list_batches(&now);
        if batches.is_empty() {
            tracing::info!("no batches to recover");
            return report;
        }
        tracing::info!(count = batches.len(), "recovering buffered batches");

        let limit = match self.config.max_batches_per_sweep {
            0 => usize::MAX,
            n => n,
        };

        for (i, id) in batches.iter().enumerate() {
            if i >= limit {
                tracing::info!(
                    remaining = batches.len() - i,
                    "batch limit reached, resuming next tick"
                );
                report.aborted = true;
                break;
            }

            let outcome = self.recover(id);
            report.batches.push(BatchResult {
                batch: id.clone(),
                outcome,
            });

            let remaining = batches.len() - i - 1;
            if remaining > 0 && elapsed_ms(self.clock, start) > self.config.recovery_budget_ms {
                tracing::warn!(remaining, "recovery time budget exceeded, aborting sweep");
                report.aborted = true;
                break;
            }
        }

        tracing::info!(
            sent = report.sent(),
            skipped = report.skipped(),
            failed = report.failed(),
            aborted = report.aborted,
            "recovery sweep finished"
        );
        report
    }

    fn recover(&mut self, id: &BatchId) -> BatchOutcome {
        let readings = match self.buffer.read_batch(id) {
            Ok(readings) => readings,
            Err(e) => {
                tracing::warn!(batch = %id, "failed to read batch: {e}");
                return BatchOutcome::ReadFailed;
            }
        };
        if readings.is_empty() {
            tracing::info!(batch = %id, "no valid data in batch");
            return BatchOutcome::Empty;
        }

        let recovered_at: DateTime<Utc> = self.clock.now();
        let payload = Payload::recovery(recovered_at.timestamp(), &readings);
        let bytes = match payload.to_bytes_within(self.config.max_recovery_payload_bytes) {
            Ok(bytes) => bytes,
            Err(Error::PayloadTooLarge { size, limit }) => {
                tracing::warn!(batch = %id, size, limit, "payload too large, keeping batch");
                return BatchOutcome::TooLarge { size };
            }
            Err(e) => {
                tracing::warn!(batch = %id, "failed to encode batch: {e}");
                return BatchOutcome::PublishFailed;
            }
        };

        let sequences = readings.iter().map(|r| r.sequence).collect();
        self.tracker.begin(self.topic, AckKey::Batch(sequences));
        tracing::info!(
            batch = %id,
            topic = %self.topic,
            readings = readings.len(),
            "publishing recovered batch"
        );
        if let Err(e) = self.channel.publish(self.topic, &bytes, Qos::AtLeastOnce, false) {
            tracing::warn!(batch = %id, "failed to publish, keeping batch: {e}");
            return BatchOutcome::PublishFailed;
        }

        let state = await_ack(
            &mut *self.channel,
            self.clock,
            &mut *self.tracker,
            self.config.recovery_ack_timeout(),
            self.config.ack_poll_interval(),
        );
        if state != AckState::Acked {
            tracing::warn!(batch = %id, "no echo for recovered batch, keeping it");
            return BatchOutcome::AckTimeout;
        }

        match self.buffer.delete_batch(id) {
            Ok(()) => BatchOutcome::Sent {
                readings: readings.len(),
            },
            Err(e) => {
                tracing::error!(batch = %id, "batch was delivered but could not be deleted: {e}");
                BatchOutcome::DeleteFailed
            }
        }
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
