//! `log` backend for the browser console.
//!
//! Library code only uses the `log` macros. On wasm32 the records go to
//! `console.error`/`warn`/`info`/`debug`, elsewhere to stderr.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logger that writes records at or above `level` to the console.
pub struct ConsoleLogger {
    level: Level,
}

impl ConsoleLogger {
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

/// Text written for one record: `LEVEL target: message`.
pub fn format_record(record: &Record<'_>) -> String {
    format!("{} {}: {}", record.level(), record.target(), record.args())
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);

        #[cfg(target_arch = "wasm32")]
        {
            let line = wasm_bindgen::JsValue::from_str(&line);
            match record.level() {
                Level::Error => web_sys::console::error_1(&line),
                Level::Warn => web_sys::console::warn_1(&line),
                Level::Info => web_sys::console::info_1(&line),
                Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        eprintln!("{line}");
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger::new(Level::Info);

/// Install the console logger at info level.
///
/// Fails if another logger was installed first.
pub fn init_console_logging() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record() {
        let line = format_record(
            &Record::builder()
                .level(Level::Warn)
                .target("membrane_graph::voxel")
                .args(format_args!("target {} is outside", 3))
                .build(),
        );
        assert_eq!(line, "WARN membrane_graph::voxel: target 3 is outside");
    }

    #[test]
    fn test_enabled_by_level() {
        let logger = ConsoleLogger::new(Level::Info);
        let info = Metadata::builder().level(Level::Info).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&debug));
    }
}
