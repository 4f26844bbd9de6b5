//! Kernel logger backed by the kernel console.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        kprintln!(
            "[{}] {}: {}",
            tag,
            record.module_path().unwrap_or("rvk"),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs the kernel logger, filtering records above `level`.
///
/// Fails if a logger is already installed, in which case the maximum level is left untouched.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
