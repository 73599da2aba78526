// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network link (radio) layer beneath the delivery channel.

use std::time::Duration;

use crate::error::Result;

/// The network layer the broker connection runs over.
pub trait NetworkLink {
    /// Returns true while the link is associated.
    fn is_up(&self) -> bool;

    /// Brings the link up, giving up after `timeout`.
    fn connect(&mut self, timeout: Duration) -> Result<()>;
}
