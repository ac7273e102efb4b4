//! # Logging
//!
//! `tracing` setup for the engine and its host.
//!
//! [`init_logging`] installs one global subscriber made of:
//! - an `EnvFilter` (our crates at the configured level, HTTP internals at
//!   `warn`, unless a custom filter is given)
//! - a console layer in [`LogFormat::Pretty`], [`LogFormat::Json`] or
//!   [`LogFormat::Compact`]
//! - a forwarding layer that hands every surviving event to the host
//!   [`LoggerSink`], the way Logcat receives native logs on Android
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::time::{LogLevel, StderrLogger};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_sink(Arc::new(StderrLogger::default())),
//! )?;
//! tracing::info!(operation = "github:profile", "Request started");
//! ```
//!
//! The engine never hands the api key, cookie values or page bodies to
//! `tracing`. Field redaction covers anything that slips through under a
//! sensitive-looking name.

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::fmt;
use std::io;
use std::sync::Arc;
use url::Url;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates whose events pass the default filter at the configured level.
const OWN_CRATES: &[&str] = &[
    "core_runtime",
    "core_engine",
    "core_service",
    "bridge_desktop",
];

/// Dependencies that are only interesting when they complain.
const QUIET_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

/// Field names whose values never leave the process unmasked.
const SENSITIVE_FIELDS: &[&str] = &[
    "api_key",
    "apikey",
    "authorization",
    "bearer",
    "cookie",
    "credential",
    "html_body",
    "password",
    "secret",
    "session",
    "token",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured; for a developer's terminal
    Pretty,
    /// One JSON object per line; for log collectors
    Json,
    /// One short line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the per-crate default.
    pub filter: Option<String>,
    pub sink: Option<Arc<dyn LoggerSink>>,
    /// Mask sensitive-looking fields before they reach the sink.
    pub redact: bool,
    /// Report span enter/exit on the console (pretty) or the span list (json).
    pub span_events: bool,
    pub show_target: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            sink: None,
            redact: true,
            span_events: true,
            show_target: true,
            show_threads: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("has_sink", &self.sink.is_some())
            .field("redact", &self.redact)
            .field("span_events", &self.span_events)
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

    pub fn with_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.span_events = enable;
        self
    }

    pub fn with_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn with_threads(mut self, show: bool) -> Self {
        self.show_threads = show;
        self
    }

    fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str();
        OWN_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level))
            .chain(QUIET_CRATES.iter().map(|krate| format!("{}=warn", krate)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber. A second call returns [`Error::Config`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let forward = SinkForwardLayer::new(config.sink.clone(), config.redact);

    tracing_subscriber::registry()
        .with(filter)
        .with(forward)
        .with(console_layer(&config))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

fn console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_target(config.show_target)
        .with_thread_ids(config.show_threads)
        .with_thread_names(config.show_threads)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => base
            .pretty()
            .with_span_events(if config.span_events {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
            .boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.span_events)
            .with_span_list(config.span_events)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Mirrors events into the host [`LoggerSink`].
///
/// Inside a Tokio runtime the sink call is spawned; elsewhere it runs to
/// completion on the logging thread.
struct SinkForwardLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl SinkForwardLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>, redact: bool) -> Self {
        Self { sink, redact }
    }

    fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("log sink failed: {}", err);
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("log sink failed: {}", err);
                }
            }
        }
    }
}

impl<S> Layer<S> for SinkForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = EntryFields::new(self.redact);
        event.record(&mut fields);

        let mut entry = LogEntry::new(
            level,
            metadata.target(),
            fields.message.take().unwrap_or_else(|| metadata.name().to_string()),
        );
        entry.fields = fields.values;
        entry.span = ctx.lookup_current().map(|span| span.name().to_string());

        Self::deliver(Arc::clone(sink), entry);
    }
}

/// Collects an event's fields, masking sensitive ones as they are recorded.
struct EntryFields {
    redact: bool,
    message: Option<String>,
    values: std::collections::BTreeMap<String, String>,
}

impl EntryFields {
    fn new(redact: bool) -> Self {
        Self {
            redact,
            message: None,
            values: Default::default(),
        }
    }

    fn put(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }
        let value = if self.redact {
            redact_if_sensitive(name, &value)
        } else {
            value
        };
        self.values.insert(name.to_string(), value);
    }
}

impl Visit for EntryFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

fn log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Mask a field value whose name looks sensitive; emails keep only their
/// first character.
///
/// ```ignore
/// info!(cookie = %redact_if_sensitive("cookie", raw), "Session captured");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_ascii_lowercase();
    if SENSITIVE_FIELDS.iter().any(|s| name.contains(s)) {
        return REDACTED.to_string();
    }
    match mask_email(value) {
        Some(masked) => masked,
        None => value.to_string(),
    }
}

fn mask_email(value: &str) -> Option<String> {
    let (local, domain) = value.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || value.contains(char::is_whitespace) {
        return None;
    }
    let first: String = local.chars().take(1).collect();
    Some(format!("{}***@{}", first, REDACTED))
}

/// Strip credentials, query string and fragment from a URL before it is
/// logged; login redirects carry tokens in all three.
///
/// ```ignore
/// debug!(url = %redact_url("https://m.uber.com/go?token=abc"), "Navigation");
/// // url=https://m.uber.com/go
/// ```
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            // Both setters refuse URLs that cannot hold userinfo, which is fine.
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => {
            let kept = &url[..url.find(['?', '#']).unwrap_or(url.len())];
            match kept.split_once("://") {
                Some((scheme, rest)) => {
                    let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
                    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
                    format!("{}://{}{}", scheme, host, path)
                }
                None => kept.to_string(),
            }
        }
    }
}
