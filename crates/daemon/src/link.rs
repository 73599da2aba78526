// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network reachability via a TCP probe of the broker address.
//!
//! A host has no radio to associate, so "link up" means the broker port
//! accepts TCP connections. Probe results are cached for `recheck` so the
//! per-tick `is_up` check does not open a socket every second.

use std::cell::Cell;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tl_core::{Error, NetworkLink, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TcpProbeLink {
    host: String,
    port: u16,
    recheck: Duration,
    up: Cell<bool>,
    checked_at: Cell<Option<Instant>>,
}

impl TcpProbeLink {
    pub fn new(host: impl Into<String>, port: u16, recheck: Duration) -> Self {
        TcpProbeLink {
            host: host.into(),
            port,
            recheck,
            up: Cell::new(false),
            checked_at: Cell::new(None),
        }
    }

    fn probe(&self, timeout: Duration) -> Result<()> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(_) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => Error::ConnectFailed(format!("{}:{}: {}", self.host, self.port, e)),
            None => Error::ConnectFailed(format!("{}:{}: no address", self.host, self.port)),
        })
    }

    fn record(&self, up: bool) {
        self.up.set(up);
        self.checked_at.set(Some(Instant::now()));
    }
}

impl NetworkLink for TcpProbeLink {
    fn is_up(&self) -> bool {
        let fresh = self.checked_at.get().is_some_and(|at| at.elapsed() < self.recheck);
        if !fresh {
            let up = self.probe(PROBE_TIMEOUT).is_ok();
            if up != self.up.get() {
                tracing::info!(host = %self.host, port = self.port, up, "link state changed");
            }
            self.record(up);
        }
        self.up.get()
    }

    fn connect(&mut self, timeout: Duration) -> Result<()> {
        let result = self.probe(timeout);
        self.record(result.is_ok());
        result
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
