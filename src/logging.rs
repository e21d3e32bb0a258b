//! Per-pass log files under `logs/`.

use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use log::LevelFilter;
use simplelog::{Config, WriteLogger};

/// Initialises a `WriteLogger` into `logs/<pass>_<timestamp>.log` and
/// returns the log path. Call once at the top of each binary.
pub fn init(pass: &str) -> Result<PathBuf> {
    fs::create_dir_all("logs").context("creating log directory")?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = PathBuf::from("logs").join(format!("{pass}_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        Config::default(),
        File::create(&log_path).with_context(|| format!("creating {}", log_path.display()))?,
    )
    .context("initialising logger")?;
    Ok(log_path)
}
