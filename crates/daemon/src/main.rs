// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! thermologd - The thermolog sensor daemon.
//!
//! Samples one temperature sensor per minute and publishes each reading to
//! an MQTT broker, buffering readings on disk while the broker is out of
//! reach and replaying them once it is back.
//!
//! Usage:
//!   thermologd --config <path>

use std::fs;
use std::path::Path;
use std::time::Duration;

mod config;
mod env;
mod error;
mod link;
mod mqtt;
mod sensor;

use config::Config;
use error::{Error, Result};
use link::TcpProbeLink;
use mqtt::MqttChannel;
use sensor::ThermalZoneSensor;
use tl_core::{DeliveryMachine, FsStorage, SystemClock, TemperatureSensor};

/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "thermologd.lock";
/// How long a link probe result stays valid.
const LINK_RECHECK: Duration = Duration::from_secs(30);

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config_path = config::config_path(&args);

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("thermologd: {e}");
            std::process::exit(1);
        }
    };

    setup_logging(config.storage.log_file.as_deref());
    tracing::info!(config = %config_path.display(), "thermologd starting");

    if let Err(e) = run(config) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    fs::create_dir_all(&config.storage.dir)?;
    let _lock = acquire_lock(&config.storage.dir.join(LOCK_NAME))?;

    let mut sensor = ThermalZoneSensor::new(&config.sensor.path);
    sensor.init()?;

    let storage = FsStorage::open(&config.storage.dir)?;
    tracing::info!(dir = %storage.root().display(), "buffer storage ready");

    let channel = MqttChannel::new(&config.device, &config.broker);
    let link = TcpProbeLink::new(config.broker.host.clone(), config.broker.port, LINK_RECHECK);

    let mut machine = DeliveryMachine::new(
        &config.device,
        config.delivery.clone(),
        storage,
        channel,
        link,
        sensor,
        SystemClock::new(),
    )?;
    machine.run()
}

fn setup_logging(log_path: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(env::names::RUST_LOG).unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    let file = log_path.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| Error::Lock(format!("cannot lock {}", lock_path.display())))?;
    Ok(file)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
