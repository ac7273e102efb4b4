//! Embedded Browser Abstraction
//!
//! Controls the in-app browser surface the engine uses for interactive
//! session capture. Every call is scoped to a [`FlowId`] so that headers and
//! cookies of concurrent flows never mix.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// Opaque identifier of one interactive flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time cookie snapshot, name to value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrowserCookies(pub BTreeMap<String, String>);

impl BrowserCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// Cookie values are credentials; only names are printed.
impl fmt::Debug for BrowserCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Embedded browser control trait
///
/// Implemented by the host UI layer:
/// - **Android**: an in-app browser activity hosting a WebView
/// - **iOS**: a WKWebView controller
/// - **Desktop/tests**: a headless recorder
///
/// # Asynchrony
///
/// `present_browser` returns as soon as the surface is requested. It does not
/// wait for the user. Completion is reported back through the engine's
/// webview event channel.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::browser::{BrowserController, FlowId};
///
/// async fn open(browser: &dyn BrowserController, flow: FlowId) -> Result<()> {
///     browser.prepare_browser(flow, "https://github.com/login").await?;
///     browser.set_browser_header(flow, "User-Agent", "Opacity").await?;
///     browser.present_browser(flow, false).await
/// }
/// ```
#[async_trait]
pub trait BrowserController: Send + Sync {
    /// Load `url` into a fresh browser context for `flow`, discarding any
    /// headers previously set for it.
    async fn prepare_browser(&self, flow: FlowId, url: &str) -> Result<()>;

    /// Add a request header for the flow. Keys are case-insensitive.
    async fn set_browser_header(&self, flow: FlowId, key: &str, value: &str) -> Result<()>;

    /// Show the prepared browser. When `intercept_requests` is set the host
    /// reports outgoing requests as `intercepted_request` events.
    async fn present_browser(&self, flow: FlowId, intercept_requests: bool) -> Result<()>;

    /// Dismiss the browser for `flow`. Closing an inactive flow succeeds.
    async fn close_browser(&self, flow: FlowId) -> Result<()>;

    /// Navigate an already presented browser to `url`.
    async fn change_browser_url(&self, flow: FlowId, url: &str) -> Result<()>;

    /// Cookies for the page currently shown. `None` when no browser is active.
    async fn cookies_for_current_url(&self, flow: FlowId) -> Result<Option<BrowserCookies>>;

    /// Cookies stored for `domain`. `None` when no browser is active.
    async fn cookies_for_domain(
        &self,
        flow: FlowId,
        domain: &str,
    ) -> Result<Option<BrowserCookies>>;
}
