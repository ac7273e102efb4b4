//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// Only one global subscriber per process, so both init calls live in one test.
#[test]
fn test_init_logging_once_and_forward_to_sink() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(target: "core_engine", operation = "zabka:points", api_key = "sk_live", "dispatch");

    {
        let entries = sink.entries.lock().unwrap();
        let entry = entries
            .iter()
            .find(|e| e.message == "dispatch")
            .expect("entry forwarded to sink");
        assert_eq!(entry.field("operation"), Some("zabka:points"));
        assert_eq!(entry.field("api_key"), Some("[REDACTED]"));
        assert_eq!(entry.level, LogLevel::Info);
    }

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_pii_redaction_credentials() {
    assert_eq!(redact_if_sensitive("api_key", "sk_test_123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("cookies", "a=b"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("html_body", "<html>"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "x"), "[REDACTED]");
}

#[test]
fn test_pii_redaction_emails() {
    let redacted = redact_if_sensitive("email", "driver@example.com");

    assert!(redacted.starts_with('d'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_pii_redaction_normal_values() {
    assert_eq!(redact_if_sensitive("operation", "carta:profile"), "carta:profile");
    assert_eq!(redact_if_sensitive("status", "200"), "200");
}

#[test]
fn test_url_redaction() {
    assert_eq!(
        redact_url("https://www.instagram.com/accounts/login/?next=%2F"),
        "https://www.instagram.com/accounts/login/"
    );
}
