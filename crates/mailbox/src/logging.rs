//! Logging backend that routes engine logs to the host via callback
//!
//! This module provides a custom `log` backend that forwards log records
//! to a host-provided [`LogSink`], so engine logs end up wherever the host
//! UI keeps its own.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

/// Receives log records from the engine
pub trait LogSink: Send + Sync {
    fn on_log(&self, level: Level, target: String, message: String);
}

/// Global storage for the forwarding logger
static SINK_LOGGER: OnceLock<SinkLogger> = OnceLock::new();

struct SinkLogger {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    max_level: RwLock<Level>,
}

impl SinkLogger {
    fn new(max_level: Level) -> Self {
        Self {
            sink: RwLock::new(None),
            max_level: RwLock::new(max_level),
        }
    }

    fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        if let Ok(mut guard) = self.sink.write() {
            *guard = sink;
        }
    }

    fn set_max_level(&self, level: Level) {
        if let Ok(mut guard) = self.max_level.write() {
            *guard = level;
        }
    }

    fn max_level(&self) -> Level {
        self.max_level.read().map(|l| *l).unwrap_or(Level::Info)
    }
}

impl Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
            && self.sink.read().ok().is_some_and(|sink| sink.is_some())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Ok(guard) = self.sink.read()
            && let Some(sink) = guard.as_ref()
        {
            sink.on_log(record.level(), record.target().to_string(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Install the forwarding logger as the global logger.
///
/// Call once at startup. Records are dropped until a sink is set with
/// [`set_log_sink`]. Fails if another logger is already installed.
pub fn init_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = SINK_LOGGER.get_or_init(|| SinkLogger::new(max_level));

    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Set the sink that receives every record. `None` drops records.
pub fn set_log_sink(sink: Option<Arc<dyn LogSink>>) {
    if let Some(logger) = SINK_LOGGER.get() {
        logger.set_sink(sink);
    }
}

/// Update the maximum log level
pub fn set_log_level(level: Level) {
    if let Some(logger) = SINK_LOGGER.get() {
        logger.set_max_level(level);
        log::set_max_level(level.to_level_filter());
    }
}
