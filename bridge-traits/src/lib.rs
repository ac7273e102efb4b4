//! # Host Bridge Traits
//!
//! Capability contract between the Opacity engine and the host application.
//!
//! ## Overview
//!
//! The engine performs named data-fetch flows but owns none of the platform
//! surfaces it needs. Each trait here is a capability the host implements
//! and injects at construction time:
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Durable secret key/value storage
//!
//! ### Interactive Flows
//! - [`BrowserController`](browser::BrowserController) - Embedded browser lifecycle, headers and cookies
//!
//! ### Environment
//! - [`DeviceInfo`](device::DeviceInfo) - OS, hardware, locale, screen and foreground state
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Outbound HTTP for handshake and upstream calls
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! The first three are bundled into [`HostCapabilityProvider`], which is what
//! the engine holds (weakly) for its whole life.
//!
//! ## Fail-Fast Strategy
//!
//! A missing capability is reported at `init` with a descriptive error
//! rather than surfacing later in the middle of a flow:
//!
//! ```ignore
//! let http = config.http_client.clone().ok_or_else(|| InitError::CapabilityMissing {
//!     capability: "HttpClient".to_string(),
//!     message: "live mode needs an HTTP client".to_string(),
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; the engine calls them from whichever
//! task is running a flow.

pub mod browser;
pub mod device;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use browser::{BrowserController, BrowserCookies, FlowId};
pub use device::{DeviceInfo, DeviceSnapshot, ScreenGeometry};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SecureStore;
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, StderrLogger, SystemClock};

/// Everything the engine needs from its host in one object.
///
/// Blanket-implemented for any type providing the three capabilities.
pub trait HostCapabilityProvider: SecureStore + BrowserController + DeviceInfo {}

impl<T> HostCapabilityProvider for T where T: SecureStore + BrowserController + DeviceInfo {}
