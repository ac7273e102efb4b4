//! # Opacity Request Engine
//!
//! Executes named data requests on behalf of a host application.
//!
//! ## Overview
//!
//! The host injects a [`HostCapabilityProvider`](bridge_traits::HostCapabilityProvider)
//! (secure storage, an embedded browser, device facts), initializes the engine
//! once with an API key and environment, then issues requests by name:
//!
//! - Catalogued operations (`uber_rider:profile`, `getGithubProfile`, ...)
//!   validate their params and know how to log in
//! - Any other `namespace:operation` name is forwarded upstream as-is
//! - Dry-run mode returns deterministic payloads without network or browser
//!
//! Interactive logins run in the host's browser; the host reports what
//! happens there through [`RequestEngine::emit_webview_event`].
//!
//! ## Features
//!
//! - Init lifecycle gate with a terminal failure state
//! - Per-request timeout and cancellation that always close the browser
//! - Bounded concurrent browser surfaces
//! - Session cookies cached per namespace in the host's secure store
//! - Results optionally attested with a proof string

pub mod catalogue;
pub mod engine;
pub mod error;
pub mod flow;
pub mod proof;
pub mod request;
pub mod session_store;
pub mod state;
pub mod upstream;
pub mod webview;

pub use catalogue::{Catalogue, OperationSpec, Target};
pub use engine::{RequestEngine, RequestEngineBuilder};
pub use error::{EngineError, ErrorCode, InitError, Result};
pub use proof::{ProofClaim, ProofGenerator, Sha256Attestor};
pub use request::{NamedRequest, OpacityPayload, OpacityResult, Params};
pub use state::{Credential, EngineState, Environment};
pub use upstream::API_VERSION;

pub use tokio_util::sync::CancellationToken;
