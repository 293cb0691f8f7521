use std::fs::File;

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ConfigBuilder, ThreadLogMode, WriteLogger};

use crate::config::Config;

/// Sends log records to the configured file. The terminal belongs to the UI,
/// so without a log file nothing is logged.
pub fn init(config: &Config) -> Result<()> {
    let Some(path) = &config.log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    let log_config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Error)
        .set_thread_mode(ThreadLogMode::Names)
        .build();
    WriteLogger::init(config.log_level, log_config, file).context("installing logger")?;
    Ok(())
}
