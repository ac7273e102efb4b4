//! Clocks and the host log sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Source of "now" for proof timestamps and session expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at_unix(seconds: i64) -> Self {
        Self(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as accepted by `EnvFilter` directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One engine log line as handed to the host.
///
/// `fields` are ordered by key so a host printing them gets stable lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub at: DateTime<Utc>,
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, String>,
    /// Innermost span the event was recorded in, e.g. `get` or `capture`.
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            at: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// `key=value` pairs joined by spaces.
    pub fn fields_line(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Host log pipeline (Logcat, OSLog, a desktop file).
///
/// Sensitive field values arrive already masked when redaction is enabled in
/// the logging config.
#[async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Entries below this level are never forwarded.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Writes one line per entry to stderr. Useful on desktop and in examples.
#[derive(Debug, Clone)]
pub struct StderrLogger {
    pub min_level: LogLevel,
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl StderrLogger {
    fn render(entry: &LogEntry) -> String {
        let mut line = format!(
            "{} {:>5} {}",
            entry.at.format("%H:%M:%S%.3f"),
            entry.level.as_str().to_uppercase(),
            entry.target
        );
        if let Some(span) = &entry.span {
            line.push_str(&format!(" [{}]", span));
        }
        line.push_str(&format!(": {}", entry.message));
        if !entry.fields.is_empty() {
            line.push(' ');
            line.push_str(&entry.fields_line());
        }
        line
    }
}

#[async_trait]
impl LoggerSink for StderrLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            eprintln!("{}", Self::render(&entry));
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
