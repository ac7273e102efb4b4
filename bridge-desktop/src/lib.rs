//! # Desktop Bridge Implementations
//!
//! Default implementations of the host capability traits for desktop and
//! headless environments (macOS, Windows, Linux, CI).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with retry/backoff
//! - `SecureStore` using the `keyring` crate, or an in-memory map
//! - `BrowserController` as a headless recorder that drivers can script
//! - `DeviceInfo` from the process environment
//! - [`DesktopHost`] combining the three host capabilities into one provider
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopHost, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let host = Arc::new(DesktopHost::with_keyring("my-app"));
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! ```

mod browser;
mod device;
mod host;
mod http;
mod secure_store;

pub use browser::{BrowserNotice, BrowserSession, HeadlessBrowser};
pub use device::DesktopDeviceInfo;
pub use host::DesktopHost;
pub use http::ReqwestHttpClient;
pub use secure_store::MemorySecureStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
