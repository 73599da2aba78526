// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Startup errors for thermologd.

use thiserror::Error;

/// Errors that stop the daemon before the delivery loop starts.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] tl_core::Error),

    #[error("{0}\n  hint: another thermologd is already using this storage directory")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, Error>;
