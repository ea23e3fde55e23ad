use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::str::FromStr;

/// Environment variable holding the maximum log level.
pub const LOG_ENV: &str = "VMSIM_LOG";

/// Writes `[LEVEL] target: message` lines to stderr.
pub struct ConsoleLogger {
    max_level: LevelFilter,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Level from [`LOG_ENV`]; `info` if unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let level = std::env::var(LOG_ENV)
            .ok()
            .and_then(|v| LevelFilter::from_str(v.trim()).ok())
            .unwrap_or(LevelFilter::Info);
        Self::new(level)
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Install as the global logger. Call once, before the first log line.
    ///
    /// # Errors
    /// If another logger is already installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn filters_by_level() {
        let logger = ConsoleLogger::new(LevelFilter::Info);
        let meta = |level| Metadata::builder().level(level).target("vmsim").build();
        assert!(logger.enabled(&meta(Level::Warn)));
        assert!(logger.enabled(&meta(Level::Info)));
        assert!(!logger.enabled(&meta(Level::Debug)));
    }
}
