//! # Logging & Tracing Infrastructure
//!
//! Installs the process-wide `tracing` subscriber for applications built on
//! the playback crates.
//!
//! ## Overview
//!
//! Library code only emits events. [`init_logging`] decides where they go:
//!
//! - stderr, as pretty, compact or JSON lines
//! - optionally a host [`LoggerSink`], which receives each event as a
//!   [`LogEntry`] after filtering
//!
//! The streaming engine logs from its own `sound-stream` threads, so the sink
//! is called from those threads too. Thread names can be added to the stderr
//! output with [`LoggingConfig::with_thread_info`].
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::logging::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//! init_logging(config)?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates that follow [`LoggingConfig::level`] when no custom filter is set.
const AUDIO_TARGETS: &[&str] = &[
    "soundkit",
    "core_runtime",
    "core_playback",
    "bridge_traits",
    "bridge_desktop",
];

/// Decoder internals are noisy below warn.
const DECODER_DIRECTIVE: &str = "symphonia=warn";

/// Shape of the stderr output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// One JSON object per event.
    Json,
    /// One short line per event.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates by the default filter.
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the default filter.
    pub filter: Option<String>,
    /// Host receiver for filtered events.
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close in pretty output, span context in JSON.
    pub enable_spans: bool,
    pub display_target: bool,
    /// Thread ids and names, which tells streaming threads apart.
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("has_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .field("display_thread_info", &self.display_thread_info)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }

    /// The filter directives this configuration resolves to.
    pub fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = level_name(self.level);
        AUDIO_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .chain(std::iter::once(DECODER_DIRECTIVE.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// Call once at startup, before opening any audio.
///
/// # Errors
///
/// [`Error::Config`] when the filter does not parse or a global subscriber
/// is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    // Exactly one of these is Some; `Option<Layer>` is a no-op when None.
    let pretty = (config.format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_span_events(span_events.clone())
            .with_writer(io::stderr)
    });
    let compact = (config.format == LogFormat::Compact).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stderr)
    });
    let json = (config.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(false)
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(compact)
        .with(json)
        .with(config.logger_sink.map(HostSinkLayer::new))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn host_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Mirrors events into a [`LoggerSink`].
struct HostSinkLayer {
    sink: Arc<dyn LoggerSink>,
}

impl HostSinkLayer {
    fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for HostSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = host_level(*metadata.level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields = fields.values;
        if let Some(span) = ctx.event_span(event) {
            entry = entry.with_span_id(span.name());
        }

        if let Err(err) = self.sink.log(entry) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

/// Flattens event fields to strings; `message` is kept apart.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{:?}", value));
    }
}

impl FieldCollector {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

/// File name of a path, for logging opened media without the directory.
///
/// ```ignore
/// info!(file = %file_name("/home/ana/Music/theme.ogg"), "opening music");
/// // file="theme.ogg"
/// ```
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as SinkResult;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl LoggerSink for RecordingSink {
        fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    #[test]
    fn test_default_directives_follow_level() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Trace)
            .directives();
        assert!(directives.contains("core_playback=trace"));
        assert!(directives.contains("bridge_desktop=trace"));
        assert!(directives.ends_with("symphonia=warn"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_custom_filter_replaces_defaults() {
        let config = LoggingConfig::default().with_filter("core_playback::stream=debug");
        assert_eq!(config.directives(), "core_playback::stream=debug");
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LoggingConfig::default().with_filter("core_playback=[[[");
        assert!(matches!(init_logging(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_debug_hides_sink() {
        let sink: Arc<dyn LoggerSink> = Arc::new(RecordingSink::default());
        let config = LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_thread_info(true)
            .with_logger_sink(sink);
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("has_sink: true"));
        assert!(rendered.contains("Compact"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/home/ana/Music/theme.ogg"), "theme.ogg");
        assert_eq!(file_name("C:\\Sounds\\hit.wav"), "hit.wav");
        assert_eq!(file_name("loop.flac"), "loop.flac");
        assert_eq!(file_name("/tmp/"), "");
    }

    #[test]
    fn test_sink_layer_forwards_filtered_events() {
        let sink = Arc::new(RecordingSink::default());
        let subscriber =
            tracing_subscriber::registry().with(HostSinkLayer::new(sink.clone() as Arc<dyn LoggerSink>));
        let _guard = tracing::subscriber::set_default(subscriber);

        let span = tracing::info_span!("open_music");
        let _entered = span.enter();
        tracing::debug!(target: "core_playback::stream", voice = 3u64, underrun = true, "re-playing voice");
        tracing::trace!(target: "core_playback::stream", "below sink level");

        let entries = sink.entries.lock();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Debug);
        assert_eq!(entry.target, "core_playback::stream");
        assert_eq!(entry.message, "re-playing voice");
        assert_eq!(entry.fields.get("voice").map(String::as_str), Some("3"));
        assert_eq!(entry.fields.get("underrun").map(String::as_str), Some("true"));
        assert_eq!(entry.span_id.as_deref(), Some("open_music"));
    }
}
