//! # Engine Configuration Module
//!
//! Provides configuration management for the Opacity engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `EngineConfig` holding the engine's tunables and the capabilities that are
//! not part of the host provider (HTTP, clock). `build()` validates every
//! value and fails fast with an actionable message.
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - Upstream calls (desktop default: reqwest). Only live
//!   (non dry-run) engines need one; its absence is reported at `init`.
//! - `Clock` - Proof timestamps and session expiry (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, a reqwest client is injected
//! automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .interactive_timeout(Duration::from_secs(90))
//!     .max_concurrent_browsers(2)
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, RetryPolicy, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default time a user has to finish an interactive browser flow.
pub const DEFAULT_INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for [`EngineConfig::interactive_timeout`].
pub const MAX_INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default lifetime of a cached session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Engine configuration.
///
/// Use [`EngineConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct EngineConfig {
    /// How long an interactive flow may wait for the user, including the
    /// wait for a free browser surface.
    pub interactive_timeout: Duration,

    /// Number of browser surfaces the host can present at once.
    pub max_concurrent_browsers: usize,

    /// Reuse captured sessions from the secure store.
    pub session_cache: bool,

    /// Age after which a cached session is discarded.
    pub session_ttl: Duration,

    /// Overrides the environment's default API base URL.
    pub api_base_url: Option<String>,

    /// HTTP client for the handshake and upstream flow calls.
    pub http_client: Option<Arc<dyn HttpClient>>,

    pub clock: Arc<dyn Clock>,

    /// Retry policy for upstream HTTP calls.
    pub retry_policy: RetryPolicy,

    /// Capacity of the event bus ring buffer.
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("interactive_timeout", &self.interactive_timeout)
            .field("max_concurrent_browsers", &self.max_concurrent_browsers)
            .field("session_cache", &self.session_cache)
            .field("session_ttl", &self.session_ttl)
            .field("api_base_url", &self.api_base_url)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field("retry_policy", &self.retry_policy)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interactive_timeout: DEFAULT_INTERACTIVE_TIMEOUT,
            max_concurrent_browsers: 1,
            session_cache: true,
            session_ttl: DEFAULT_SESSION_TTL,
            api_base_url: None,
            http_client: None,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Interactive timeout is > 0 and at most 30 minutes
    /// - At least one browser surface is available
    /// - Session TTL is > 0 when caching is enabled
    /// - The base URL override, if any, is an absolute http(s) URL
    /// - The event buffer is non-empty
    pub fn validate(&self) -> Result<()> {
        if self.interactive_timeout.is_zero() {
            return Err(Error::Config(
                "Interactive timeout must be greater than 0".to_string(),
            ));
        }

        if self.interactive_timeout > MAX_INTERACTIVE_TIMEOUT {
            return Err(Error::Config(
                "Interactive timeout exceeds maximum of 30 minutes".to_string(),
            ));
        }

        if self.max_concurrent_browsers == 0 {
            return Err(Error::Config(
                "At least one concurrent browser surface is required".to_string(),
            ));
        }

        if self.session_cache && self.session_ttl.is_zero() {
            return Err(Error::Config(
                "Session TTL must be greater than 0 when the session cache is enabled. \
                 Disable the cache instead of setting a zero TTL."
                    .to_string(),
            ));
        }

        if let Some(ref base) = self.api_base_url {
            let parsed = url::Url::parse(base)
                .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", base, e)))?;
            if parsed.scheme() != "https" && parsed.scheme() != "http" {
                return Err(Error::Config(format!(
                    "API base URL must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The HTTP client, or a `CapabilityMissing` error naming what to inject.
    pub fn require_http_client(&self) -> Result<Arc<dyn HttpClient>> {
        self.http_client
            .clone()
            .ok_or_else(http_client_missing_error)
    }
}

fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient is required for live (non dry-run) requests. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack, or initialize in dry-run mode."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    match ReqwestHttpClient::new() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Default HTTP client unavailable");
            None
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

/// Builder for constructing [`EngineConfig`] instances.
#[derive(Default)]
pub struct EngineConfigBuilder {
    interactive_timeout: Option<Duration>,
    max_concurrent_browsers: Option<usize>,
    session_cache: Option<bool>,
    session_ttl: Option<Duration>,
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    retry_policy: Option<RetryPolicy>,
    event_buffer_size: Option<usize>,
}

impl EngineConfigBuilder {
    pub fn interactive_timeout(mut self, timeout: Duration) -> Self {
        self.interactive_timeout = Some(timeout);
        self
    }

    pub fn max_concurrent_browsers(mut self, count: usize) -> Self {
        self.max_concurrent_browsers = Some(count);
        self
    }

    pub fn session_cache(mut self, enabled: bool) -> Self {
        self.session_cache = Some(enabled);
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    /// Point the engine at a different API host (staging mirrors, tests).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the final `EngineConfig`.
    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            interactive_timeout: self
                .interactive_timeout
                .unwrap_or(defaults.interactive_timeout),
            max_concurrent_browsers: self
                .max_concurrent_browsers
                .unwrap_or(defaults.max_concurrent_browsers),
            session_cache: self.session_cache.unwrap_or(defaults.session_cache),
            session_ttl: self.session_ttl.unwrap_or(defaults.session_ttl),
            api_base_url: self.api_base_url,
            http_client: self.http_client.or_else(provide_default_http_client),
            clock: self.clock.unwrap_or(defaults.clock),
            retry_policy: self.retry_policy.unwrap_or(defaults.retry_policy),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, FixedClock, HttpRequest, HttpResponse};

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Ok(HttpResponse::new(200, "{}"))
        }
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::builder().build().unwrap();

        assert_eq!(config.interactive_timeout, DEFAULT_INTERACTIVE_TIMEOUT);
        assert_eq!(config.max_concurrent_browsers, 1);
        assert!(config.session_cache);
        assert_eq!(config.session_ttl, DEFAULT_SESSION_TTL);
        assert_eq!(config.api_base_url, None);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::builder()
            .interactive_timeout(Duration::from_secs(5))
            .max_concurrent_browsers(3)
            .session_cache(false)
            .session_ttl(Duration::ZERO)
            .api_base_url("http://127.0.0.1:8080/")
            .http_client(Arc::new(MockHttpClient))
            .clock(Arc::new(FixedClock::at_unix(1_700_000_000)))
            .retry_policy(RetryPolicy::none())
            .build()
            .unwrap();

        assert_eq!(config.interactive_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_browsers, 3);
        assert_eq!(config.api_base_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.clock.unix_timestamp(), 1_700_000_000);
        assert_eq!(config.retry_policy.max_attempts, 1);
        assert!(config.require_http_client().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = EngineConfig::builder()
            .interactive_timeout(Duration::ZERO)
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be greater than 0"));
    }

    #[test]
    fn test_validate_rejects_excessive_timeout() {
        let result = EngineConfig::builder()
            .interactive_timeout(Duration::from_secs(31 * 60))
            .build();

        assert!(result.unwrap_err().to_string().contains("30 minutes"));
    }

    #[test]
    fn test_validate_rejects_zero_browsers() {
        let result = EngineConfig::builder().max_concurrent_browsers(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_ttl_with_cache() {
        let result = EngineConfig::builder()
            .session_ttl(Duration::ZERO)
            .build();
        assert!(result.unwrap_err().to_string().contains("Session TTL"));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        assert!(EngineConfig::builder().api_base_url("not a url").build().is_err());
        assert!(EngineConfig::builder()
            .api_base_url("ftp://files.example.com")
            .build()
            .unwrap_err()
            .to_string()
            .contains("http or https"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_capability_error() {
        let config = EngineConfig::builder().build().unwrap();
        let err = config.require_http_client().unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { .. }));
        assert!(err.to_string().contains("HttpClient"));
    }

    #[test]
    fn test_debug_hides_capabilities() {
        let config = EngineConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .build()
            .unwrap();
        let printed = format!("{:?}", config);

        assert!(printed.contains("HttpClient { ... }"));
        assert!(printed.contains("interactive_timeout"));
    }
}
