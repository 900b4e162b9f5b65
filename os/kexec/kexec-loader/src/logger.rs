use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

/// Logger that drops every record. The loader's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

pub static NULL_LOGGER: NullLogger = NullLogger;

impl Log for NullLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        false
    }

    fn log(&self, _record: &Record) {}

    fn flush(&self) {}
}

/// Level-filtered logger writing `[LEVEL] target: message` lines to stderr.
#[derive(Debug, Clone, Copy)]
pub struct StderrLogger {
    max_level: LevelFilter,
}

impl StderrLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Move the logger to the heap for the rest of the process and hand out
    /// the `'static` reference the loader takes.
    #[must_use]
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }

    /// Install as the global `log` logger as well.
    ///
    /// # Errors
    /// Fails if a global logger has already been set.
    pub fn init(self) -> Result<&'static Self, SetLoggerError> {
        let logger = self.leak();
        log::set_logger(logger)?;
        log::set_max_level(logger.max_level);
        Ok(logger)
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // A failed write to stderr has nowhere left to be reported.
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Emit a record through an explicit `&dyn Log` instead of the global logger.
///
/// ```ignore
/// emit!(self.logger, Level::Debug, "kernel at {}", start);
/// ```
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let level: ::log::Level = $level;
        if level <= ::log::STATIC_MAX_LEVEL {
            let logger: &dyn ::log::Log = $logger;
            let metadata = ::log::Metadata::builder()
                .level(level)
                .target(module_path!())
                .build();
            if logger.enabled(&metadata) {
                logger.log(
                    &::log::Record::builder()
                        .metadata(metadata)
                        .args(format_args!($($arg)+))
                        .module_path_static(Some(module_path!()))
                        .file_static(Some(file!()))
                        .line(Some(line!()))
                        .build(),
                );
            }
        }
    }};
}

pub(crate) use emit;

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn null_logger_is_never_enabled() {
        let metadata = Metadata::builder().level(Level::Error).build();
        assert!(!NULL_LOGGER.enabled(&metadata));
    }

    #[test]
    fn stderr_logger_filters_by_level() {
        let logger = StderrLogger::new(LevelFilter::Info);
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }

    struct Capture {
        records: std::sync::Mutex<Vec<(Level, String, String)>>,
    }

    impl Log for Capture {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Info
        }

        fn log(&self, record: &Record) {
            self.records.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }

        fn flush(&self) {}
    }

    #[test]
    fn emit_reaches_an_explicit_logger() {
        static CAPTURE: Capture = Capture {
            records: std::sync::Mutex::new(Vec::new()),
        };

        emit!(&CAPTURE, Level::Info, "emitted {}", 42);
        emit!(&CAPTURE, Level::Debug, "below the capture level");
        emit!(&NULL_LOGGER, Level::Error, "dropped");

        let records = CAPTURE.records.lock().unwrap();
        assert_eq!(
            *records,
            [(
                Level::Info,
                module_path!().to_string(),
                "emitted 42".to_string()
            )]
        );
    }
}
