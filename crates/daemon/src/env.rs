// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the daemon.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`names`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

/// Returns the value of `THERMOLOG_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    std::env::var(names::THERMOLOG_CONFIG).ok().map(PathBuf::from)
}

/// Returns the value of `XDG_CONFIG_HOME` if set.
pub fn xdg_config_home() -> Option<PathBuf> {
    std::env::var(names::XDG_CONFIG_HOME).ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
