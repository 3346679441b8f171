//! Injectable log sink.
//!
//! Sessions and discovery write their records to the `log::Log` held in
//! [`Config`](crate::Config) instead of reaching for the process-wide logger
//! directly. The default, [`Facade`], forwards to whatever logger the
//! application installed (`env_logger` in the bundled binary), so nothing
//! changes for callers that don't care.

use log::{Log, Metadata, Record};
use std::sync::Arc;

/// Forwards every record to the global `log` logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct Facade;

impl Facade {
    pub fn shared() -> Arc<dyn Log> {
        Arc::new(Facade)
    }
}

impl Log for Facade {
    fn enabled(&self, metadata: &Metadata) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

/// Writes a record to an injected sink, in the shape of the `log` macros.
///
/// Arguments are only evaluated when the sink has the level enabled.
macro_rules! emit {
    ($sink:expr, $level:expr, $($arg:tt)+) => {{
        let sink = &$sink;
        let level = $level;
        let metadata = log::Metadata::builder()
            .level(level)
            .target(module_path!())
            .build();
        if sink.enabled(&metadata) {
            sink.log(
                &log::Record::builder()
                    .metadata(metadata)
                    .args(format_args!($($arg)+))
                    .module_path_static(Some(module_path!()))
                    .file_static(Some(file!()))
                    .line(Some(line!()))
                    .build(),
            )
        }
    }};
}

pub(crate) use emit;

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Level, String)>>);

    impl Log for Capture {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.0
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn emit_reaches_injected_sink() {
        let sink = Arc::new(Capture::default());
        let as_log: Arc<dyn Log> = sink.clone();

        emit!(as_log, Level::Warn, "[Device][new] {} endpoints", 3);

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, Level::Warn);
        assert_eq!(records[0].1, "[Device][new] 3 endpoints");
    }

    /// Accepts records up to Debug.
    #[derive(Default)]
    struct UpToDebug(Capture);

    impl Log for UpToDebug {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Debug
        }

        fn log(&self, record: &Record) {
            self.0.log(record)
        }

        fn flush(&self) {}
    }

    #[test]
    fn disabled_level_skips_arguments() {
        let sink = Arc::new(UpToDebug::default());
        let as_log: Arc<dyn Log> = sink.clone();
        let evaluated = std::cell::Cell::new(0);
        let body = || {
            evaluated.set(evaluated.get() + 1);
            "<s:Envelope/>"
        };

        emit!(as_log, Level::Trace, "reply: {}", body());
        assert_eq!(evaluated.get(), 0);
        assert!(sink.0.0.lock().unwrap().is_empty());

        emit!(as_log, Level::Debug, "reply: {}", body());
        assert_eq!(evaluated.get(), 1);
        assert_eq!(sink.0.0.lock().unwrap().len(), 1);
    }
}
