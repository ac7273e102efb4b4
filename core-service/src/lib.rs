//! Core service façade and bootstrap helpers.
//!
//! This crate is the boundary between host applications and the request
//! engine. It turns engine results into status-tagged response objects with
//! JSON error envelopes, reports SDK versions, and offers a blocking variant
//! for hosts that call in from plain threads. Desktop apps typically enable
//! the `desktop-shims` feature (which depends on `bridge-desktop`) and start
//! from [`bootstrap_desktop`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_service::{OpacityCore, OpacityError};
//!
//! let core = OpacityCore::new(host, EngineConfig::builder().build()?)?;
//! let status = core.init("sk_live_123", false, 4, false).await;
//! assert!(status.is_ok());
//!
//! let response = core.get("getGithubProfile", None).await;
//! match response.error() {
//!     None => println!("{}", response.json.unwrap_or_default()),
//!     Some(OpacityError { code, description }) => eprintln!("{code}: {description}"),
//! }
//! ```

mod blocking;
pub mod error;
mod facade;
pub mod response;

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
mod bootstrap;

pub use blocking::BlockingOpacityCore;
pub use error::{CoreError, Result};
pub use facade::{OpacityCore, CORE_VERSION};
pub use response::{InitStatus, OpacityError, OpacityResponse, STATUS_OK, UNKNOWN_ERROR};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bootstrap::{bootstrap_desktop, bootstrap_desktop_with};

pub use core_engine::{CancellationToken, Environment, API_VERSION};
