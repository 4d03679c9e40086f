use chrono::Local;
use log::{LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;
use crate::settings::{Settings, get_data_dir};

#[derive(Debug)]
struct FileLogger {
    log_file: PathBuf,
    level: LevelFilter,
}

static LOGGER: OnceCell<FileLogger> = OnceCell::new();

impl log::Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_entry = format!(
                "{} {} [{}] {}\n",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            );
            if let Ok(mut file) = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_file)
            {
                let _ = file.write_all(log_entry.as_bytes());
            }
        }
    }

    fn flush(&self) {}
}

pub fn level_for(settings: &Settings) -> LevelFilter {
    if settings.debug_mode {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

// The terminal is owned by the UI, so everything goes to a file in the data directory.
pub fn init(settings: &Settings) -> Result<()> {
    let log_path = get_data_dir();
    create_dir_all(&log_path)?;

    let level = level_for(settings);
    let logger = LOGGER.get_or_init(|| FileLogger {
        log_file: log_path.join("log.txt"),
        level,
    });

    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
