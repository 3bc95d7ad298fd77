//! Integration tests for the logging setup.
//!
//! Only one global subscriber can be installed per process, so this file
//! performs a single `init_logging` call and checks the second one fails.

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, preview, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait::async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[test]
fn global_init_mirrors_to_sink_and_only_succeeds_once() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first init succeeds");

    tracing::info!(target: "core_channel", state = "open", "Channel state changed");
    tracing::info!(target: "sqlx::query", "filtered out by the default directives");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Channel state changed");
        assert_eq!(entries[0].fields.get("state").map(String::as_str), Some("open"));
    }

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn config_builder_chains() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_filter("core_media=trace")
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(config.filter.as_deref(), Some("core_media=trace"));
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn default_format_follows_build_profile() {
    #[cfg(debug_assertions)]
    assert_eq!(LogFormat::default(), LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LogFormat::default(), LogFormat::Json);
}

#[test]
fn preview_keeps_short_frames_intact() {
    let frame = r#"{"type":"chat_message"}"#;
    assert_eq!(preview(frame, 200), frame);
    assert!(preview(&"x".repeat(500), 16).ends_with("(500 bytes)"));
}
