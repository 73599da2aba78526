// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Time source for the delivery loop.
//!
//! Wall-clock time names batches and stamps readings; the monotonic
//! counter and `sleep` drive every bounded wait (ack timeout, reconnect
//! backoff, sweep budget). Injecting the clock lets tests run those waits
//! without real elapsed time.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Trait for reading time and waiting.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds on a monotonic counter with an arbitrary origin.
    fn monotonic_ms(&self) -> u64;

    /// Blocks the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// System clock implementation using `chrono::Utc` and `std::time::Instant`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (*self).now()
    }

    fn monotonic_ms(&self) -> u64 {
        (*self).monotonic_ms()
    }

    fn sleep(&self, duration: Duration) {
        (*self).sleep(duration)
    }
}

/// Milliseconds elapsed on `clock` since `start_ms`.
pub fn elapsed_ms<C: Clock + ?Sized>(clock: &C, start_ms: u64) -> u64 {
    clock.monotonic_ms().saturating_sub(start_ms)
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
