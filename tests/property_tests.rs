//! Property-based tests for sparrow_log using proptest

use proptest::prelude::*;
use sparrow_log::core::sink::Locked;
use sparrow_log::core::{Tee, TeeEntry};
use sparrow_log::prelude::*;
use sparrow_log::sinks::{BufferOptions, BufferedWriteSyncer, RotatingFileSink, RotationPolicy};
use sparrow_log::{
    Encoder, EncoderConfig, LogRecord, LoggerMetrics, MemorySink, Sink, WriteSyncer,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::ALL.to_vec())
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// A record reaches a sink exactly when its level is at or above the threshold
    #[test]
    fn test_delivery_iff_at_or_above_threshold(level in any_level(), threshold in any_level()) {
        let memory = MemorySink::new();
        let controller = LevelController::new(threshold);
        let tee = Tee::new(
            vec![TeeEntry::new(
                Encoder::json(EncoderConfig::default()),
                Arc::new(Locked::new(memory.clone())),
                controller,
            )],
            Arc::new(LoggerMetrics::new()),
        );

        tee.emit(&LogRecord::new(level, "probe"));

        prop_assert_eq!(memory.lines().len() == 1, level >= threshold);
    }

    /// Level names parse regardless of case and surrounding whitespace
    #[test]
    fn test_level_parse_case_insensitive(
        level in any_level(),
        upper in any::<bool>(),
        pad in 0usize..3,
    ) {
        let name = if upper { level.as_str().to_uppercase() } else { level.as_str().to_string() };
        let text = format!("{}{}{}", " ".repeat(pad), name, " ".repeat(pad));

        let controller = LevelController::new(LogLevel::Info);
        controller.parse_and_set(&text).unwrap();
        prop_assert_eq!(controller.get(), level);
    }

    /// Unknown level text never changes the current level
    #[test]
    fn test_invalid_level_keeps_previous(text in "[a-z]{1,12}", start in any_level()) {
        prop_assume!(text.parse::<LogLevel>().is_err());
        let controller = LevelController::new(start);
        prop_assert!(controller.parse_and_set(&text).is_err());
        prop_assert_eq!(controller.get(), start);
    }
}

// ============================================================================
// Encoder Tests
// ============================================================================

proptest! {
    /// Console output is one line whatever the message contains
    #[test]
    fn test_console_record_is_single_line(message in "\\PC*", newlines in 0usize..4) {
        let message = format!("{}{}", message, "\n".repeat(newlines));
        let encoder = Encoder::console(EncoderConfig::default());
        let record = LogRecord::new(LogLevel::Info, message);
        let text = String::from_utf8(encoder.encode(&record)).unwrap();

        prop_assert!(text.ends_with('\n'));
        prop_assert_eq!(text.matches('\n').count(), 1);
    }

    /// JSON output parses back to the same message and fields
    #[test]
    fn test_json_preserves_message_and_fields(
        message in "\\PC*",
        key in "[a-z_]{1,10}",
        value in any::<i64>(),
    ) {
        prop_assume!(!["ts", "lv", "logger", "caller", "msg", "stack"].contains(&key.as_str()));
        let record = LogRecord::new(LogLevel::Warn, message.clone())
            .with_fields(vec![Field::int(key.clone(), value)]);
        let bytes = Encoder::json(EncoderConfig::default()).encode(&record);

        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(parsed["msg"].as_str(), Some(message.as_str()));
        prop_assert_eq!(parsed[key.as_str()].as_i64(), Some(value));
        prop_assert_eq!(parsed["lv"].as_str(), Some("warn"));
    }

    /// Debug-width padding never truncates
    #[test]
    fn test_padding_never_truncates(message in "[a-zA-Z0-9 ]{0,64}") {
        let encoder = Encoder::console(EncoderConfig::default().with_message_width(Some(32)));
        let record = LogRecord::new(LogLevel::Info, message.clone());
        let text = String::from_utf8(encoder.encode(&record)).unwrap();
        prop_assert!(text.contains(&message));
        let rendered = text.trim_end_matches('\n').rsplit('\t').next().unwrap();
        prop_assert!(rendered.starts_with(&message));
        prop_assert_eq!(rendered.len(), message.len().max(32));
    }
}

// ============================================================================
// Sink Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Buffering never loses, duplicates or reorders bytes
    #[test]
    fn test_buffered_preserves_byte_stream(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..100),
        buffer_size in 1usize..512,
    ) {
        let memory = MemorySink::new();
        let buffered = BufferedWriteSyncer::new(
            memory.clone(),
            BufferOptions { buffer_size, flush_interval: Duration::from_millis(5) },
        ).unwrap();

        for chunk in &chunks {
            buffered.write(chunk).unwrap();
        }
        buffered.close().unwrap();

        prop_assert_eq!(memory.contents(), chunks.concat());
    }

    /// Archives oldest to newest followed by the active file replay every write
    #[test]
    fn test_rotation_replays_full_stream(
        chunks in prop::collection::vec("[a-z]{1,40}\n", 1..60),
        max_bytes in 16u64..256,
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        let mut sink = RotatingFileSink::with_policy(
            &path,
            RotationPolicy::never().with_max_size(max_bytes),
        ).unwrap();

        for chunk in &chunks {
            sink.write(chunk.as_bytes()).unwrap();
        }
        sink.sync().unwrap();

        let mut replay = String::new();
        for archive in sink.backups() {
            replay.push_str(&fs::read_to_string(archive).unwrap());
        }
        replay.push_str(&fs::read_to_string(&path).unwrap());
        prop_assert_eq!(replay, chunks.concat());
    }
}
