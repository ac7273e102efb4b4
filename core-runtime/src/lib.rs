//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Opacity engine:
//! - Logging and tracing infrastructure
//! - Engine configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on.
//! It establishes the logging conventions, the validated configuration the
//! engine is built from, and the broadcast channel engine events flow through.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
