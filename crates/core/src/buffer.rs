// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Batched buffer for readings that could not be delivered in real time.
//!
//! Readings are appended as `timestamp,value,sequence` lines to the active
//! batch file `{YYYY}/{MMDDHHmm}.csv`, named after the time the batch was
//! started. A new batch starts when there is no active batch, the active
//! batch holds `rotation_cap` lines, or the year folder changed. A batch is
//! only ever appended to, and is removed whole once it has been recovered.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::Result;
use crate::reading::Reading;
use crate::storage::Storage;

/// File extension of batch files.
pub const BATCH_EXTENSION: &str = "csv";

/// Batches whose first record is older than this are never recovered.
pub const MAX_BATCH_AGE_SECS: i64 = 86_400;

/// Identifier of a batch: its path relative to the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(String);

impl BatchId {
    /// Builds an id from a folder and file name.
    pub fn new(folder: &str, file_name: &str) -> Self {
        BatchId(format!("{folder}/{file_name}"))
    }

    /// The `{folder}/{file}` path of this batch.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The year folder containing this batch.
    pub fn folder(&self) -> &str {
        self.0.split_once('/').map(|(folder, _)| folder).unwrap_or("")
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Year folder for a timestamp, e.g. `2025`.
pub fn folder_name(now: &DateTime<Utc>) -> String {
    now.format("%Y").to_string()
}

/// Batch id derived from a timestamp, e.g. `2025/07261455.csv`.
pub fn batch_name(now: &DateTime<Utc>) -> BatchId {
    BatchId::new(
        &folder_name(now),
        &format!("{}.{BATCH_EXTENSION}", now.format("%m%d%H%M")),
    )
}

/// Returns true if a batch starting at `first_timestamp` is too old to recover.
///
/// Timestamps far enough in the past to overflow the age count as stale.
pub fn is_stale(now: &DateTime<Utc>, first_timestamp: i64) -> bool {
    now.timestamp().saturating_sub(first_timestamp) > MAX_BATCH_AGE_SECS
}

#[derive(Debug)]
struct ActiveBatch {
    id: BatchId,
    lines: usize,
}

/// Rotating batch buffer over a [`Storage`] backend.
pub struct BatchBuffer<S: Storage> {
    storage: S,
    rotation_cap: usize,
    active: Option<ActiveBatch>,
}

impl<S: Storage> BatchBuffer<S> {
    /// Creates a buffer with the given rotation cap (lines per batch).
    pub fn new(storage: S, rotation_cap: usize) -> Self {
        BatchBuffer {
            storage,
            rotation_cap: rotation_cap.max(1),
            active: None,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// The batch the next append goes to, unless it rotates first.
    pub fn active_batch(&self) -> Option<&BatchId> {
        self.active.as_ref().map(|a| &a.id)
    }

    /// Lines written to the active batch since it was started.
    pub fn active_line_count(&self) -> usize {
        self.active.as_ref().map(|a| a.lines).unwrap_or(0)
    }

    /// Appends one reading and returns the batch it was written to.
    ///
    /// A failed write is not retried; the reading is lost.
    pub fn append_reading(&mut self, now: &DateTime<Utc>, reading: &Reading) -> Result<BatchId> {
        let folder = folder_name(now);
        if !self.storage.exists(&folder) {
            self.storage.create_dir(&folder)?;
        }

        let rotate = match &self.active {
            None => true,
            Some(active) => active.lines >= self.rotation_cap || active.id.folder() != folder,
        };
        if rotate {
            let id = self.fresh_batch_id(now);
            tracing::debug!(batch = %id, "starting new batch");
            self.active = Some(ActiveBatch { id, lines: 0 });
        }

        let Some(active) = self.active.as_mut() else {
            return Err(crate::Error::Storage("no active batch".to_string()));
        };
        self.storage.append(active.id.as_str(), &reading.to_line())?;
        active.lines += 1;

        tracing::info!(
            batch = %active.id,
            sequence = reading.sequence,
            lines = active.lines,
            "buffered reading"
        );
        Ok(active.id.clone())
    }

    /// Lists recoverable batches, oldest first.
    ///
    /// Scans the current year folder, plus the previous one while `now` is
    /// within 24 hours of New Year. Batches whose first record is older
    /// than 24 hours are left out.
    pub fn list_batches(&self, now: &DateTime<Utc>) -> Vec<BatchId> {
        let mut found: Vec<(Option<i64>, BatchId)> = Vec::new();

        for id in self.scan(now) {
            let first = self.first_timestamp(&id);
            if let Some(ts) = first {
                if is_stale(now, ts) {
                    tracing::debug!(
                        batch = %id,
                        first_timestamp = ts,
                        "skipping batch older than 24h"
                    );
                    continue;
                }
            }
            found.push((first, id));
        }

        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Reads all well-formed readings of a batch, in insertion order.
    ///
    /// Malformed lines are skipped individually.
    pub fn read_batch(&self, id: &BatchId) -> Result<Vec<Reading>> {
        let content = self.storage.read_to_string(id.as_str())?;
        let mut readings = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match Reading::parse_line(line) {
                Ok(reading) => readings.push(reading),
                Err(e) => tracing::warn!(batch = %id, "skipping line: {e}"),
            }
        }

        Ok(readings)
    }

    /// Removes a batch. Deleting the active batch makes the next append
    /// start a fresh one.
    pub fn delete_batch(&mut self, id: &BatchId) -> Result<()> {
        self.storage.remove(id.as_str())?;
        if self.active.as_ref().is_some_and(|a| &a.id == id) {
            self.active = None;
        }
        tracing::info!(batch = %id, "deleted batch");
        Ok(())
    }

    /// Deletes batches that are too old to be recovered.
    ///
    /// Returns the number of batches removed.
    pub fn prune_stale(&mut self, now: &DateTime<Utc>) -> usize {
        let mut pruned = 0;
        for id in self.scan(now) {
            let Some(ts) = self.first_timestamp(&id) else {
                continue;
            };
            if !is_stale(now, ts) {
                continue;
            }
            match self.delete_batch(&id) {
                Ok(()) => pruned += 1,
                Err(e) => tracing::warn!(batch = %id, "failed to prune stale batch: {e}"),
            }
        }
        pruned
    }

    /// Every batch file in the folders relevant to `now`.
    fn scan(&self, now: &DateTime<Utc>) -> Vec<BatchId> {
        let mut folders = vec![folder_name(now)];
        let window_start = *now - Duration::seconds(MAX_BATCH_AGE_SECS);
        if window_start.year() != now.year() {
            folders.insert(0, folder_name(&window_start));
        }

        let suffix = format!(".{BATCH_EXTENSION}");
        let mut ids = Vec::new();
        for folder in folders {
            match self.storage.list_dir(&folder) {
                Ok(names) => ids.extend(
                    names
                        .iter()
                        .filter(|name| name.ends_with(&suffix))
                        .map(|name| BatchId::new(&folder, name)),
                ),
                Err(e) => tracing::warn!(folder = %folder, "failed to list batches: {e}"),
            }
        }
        ids
    }

    /// Timestamp field of the first non-blank line, if it parses.
    fn first_timestamp(&self, id: &BatchId) -> Option<i64> {
        let content = self.storage.read_to_string(id.as_str()).ok()?;
        let line = content.lines().find(|l| !l.trim().is_empty())?;
        line.split(',').next()?.trim().parse().ok()
    }

    /// A batch id for `now` that does not collide with an existing file.
    fn fresh_batch_id(&self, now: &DateTime<Utc>) -> BatchId {
        let folder = folder_name(now);
        let stem = now.format("%m%d%H%M").to_string();
        let mut id = batch_name(now);
        let mut n = 1;
        while self.storage.exists(id.as_str()) {
            id = BatchId::new(&folder, &format!("{stem}-{n}.{BATCH_EXTENSION}"));
            n += 1;
        }
        id
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
