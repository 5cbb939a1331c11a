//! Formatting macros over the `*f` logger methods.
//!
//! Each macro takes the logger first, then `format!`-style arguments. The
//! caller location recorded is the macro invocation site.
//!
//! # Examples
//!
//! ```
//! use sparrow_log::{info, Logger};
//!
//! let logger = Logger::nop();
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log at an explicit level.
///
/// ```
/// # use sparrow_log::{Logger, LogLevel};
/// # let logger = Logger::nop();
/// use sparrow_log::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.logf($level, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.debugf(format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.infof(format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warnf(format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.errorf(format_args!($($arg)+))
    };
}

/// Log at `dpanic`; panics afterwards unless the logger is in debug mode.
#[macro_export]
macro_rules! dpanic {
    ($logger:expr, $($arg:tt)+) => {
        $logger.dpanicf(format_args!($($arg)+))
    };
}

/// Log at `fatal` and exit; only prints a diagnostic in debug mode.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatalf(format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{
        Config, Encoder, EncoderConfig, LevelController, Locked, LogLevel, Logger, LoggerMetrics,
        MemorySink, Tee, TeeEntry,
    };
    use std::sync::Arc;

    fn capture() -> (Logger, MemorySink) {
        let memory = MemorySink::new();
        let level = LevelController::new(LogLevel::Debug);
        let tee = Tee::new(
            vec![TeeEntry::new(
                Encoder::json(EncoderConfig::default()),
                Arc::new(Locked::new(memory.clone())),
                level.clone(),
            )],
            Arc::new(LoggerMetrics::new()),
        );
        let config = Config {
            debug: true,
            ..Config::default()
        };
        (Logger::from_parts(tee, level, config, None), memory)
    }

    fn messages(memory: &MemorySink) -> Vec<String> {
        memory
            .lines()
            .iter()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["msg"].as_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_leveled_macros() {
        let (logger, memory) = capture();
        debug!(logger, "Count: {}", 5);
        info!(logger, "Items: {}", 100);
        warn!(logger, "Retry {} of {}", 1, 3);
        error!(logger, "Code: {}", 500);
        log!(logger, LogLevel::Info, "plain");

        assert_eq!(
            messages(&memory),
            vec!["Count: 5", "Items: 100", "Retry 1 of 3", "Code: 500", "plain"]
        );
    }

    #[test]
    fn test_terminal_macros_in_debug_mode() {
        let (logger, memory) = capture();
        dpanic!(logger, "state {}", "corrupt");
        fatal!(logger, "unreachable {}", 1);

        // dpanic is recorded, fatal only prints its diagnostic
        assert_eq!(messages(&memory), vec!["state corrupt"]);
    }

    #[test]
    fn test_macro_records_invocation_site() {
        let (logger, memory) = capture();
        let line = line!() + 1;
        info!(logger, "here");

        let value: serde_json::Value = serde_json::from_str(&memory.lines()[0]).unwrap();
        assert!(value["caller"]
            .as_str()
            .unwrap()
            .ends_with(&format!("macros.rs:{}", line)));
    }
}
