//! Integration tests for logging system

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{file_name, init_logging, LogFormat, LoggingConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl LoggerSink for CollectingSink {
    fn log(&self, entry: LogEntry) -> bridge_traits::Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

// Logging can only be initialized once per process, so the whole global
// lifecycle lives in this single test.
#[test]
fn test_init_logging_forwards_to_sink_from_any_thread() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info)
        .with_filter("info")
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(target: "core_playback::stream", voice = 1u64, "stream started");
    thread::Builder::new()
        .name("sound-stream".to_string())
        .spawn(|| tracing::warn!(target: "core_playback::stream", "underrun"))
        .unwrap()
        .join()
        .unwrap();
    tracing::debug!(target: "core_playback::stream", "filtered out");

    {
        let entries = sink.entries.lock();
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"stream started"));
        assert!(messages.contains(&"underrun"));
        assert!(!messages.contains(&"filtered out"));
    }

    // Second initialization is rejected
    let again = init_logging(LoggingConfig::default());
    assert!(again.is_err());
}

#[test]
fn test_file_name_for_media_paths() {
    assert_eq!(file_name("/srv/audio/ambience/forest.ogg"), "forest.ogg");
    assert_eq!(file_name("D:\\Game\\sfx\\door.wav"), "door.wav");
    assert_eq!(file_name("theme.flac"), "theme.flac");
    assert_eq!(file_name(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
