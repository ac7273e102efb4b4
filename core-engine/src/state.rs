//! Engine lifecycle: environment selection, the stored credential and the
//! `Uninitialized -> Initializing -> Ready | Failed` state machine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use crate::error::InitError;

/// Deployment environment selected at `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Sandbox,
    Staging,
    Production,
}

impl Environment {
    /// Host-facing integer codes: 1 local, 2 sandbox, 3 staging, 4 production.
    pub fn from_code(code: i32) -> Result<Self, InitError> {
        match code {
            1 => Ok(Environment::Local),
            2 => Ok(Environment::Sandbox),
            3 => Ok(Environment::Staging),
            4 => Ok(Environment::Production),
            other => Err(InitError::UnsupportedEnvironment(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Environment::Local => 1,
            Environment::Sandbox => 2,
            Environment::Staging => 3,
            Environment::Production => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Sandbox => "sandbox",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:8080",
            Environment::Sandbox => "https://sandbox.opacity.network",
            Environment::Staging => "https://staging.opacity.network",
            Environment::Production => "https://api.opacity.network",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful `init` stores. Immutable once the engine is ready.
#[derive(Clone)]
pub struct Credential {
    api_key: String,
    pub environment: Environment,
    pub dry_run: bool,
    pub show_errors_in_webview: bool,
}

impl Credential {
    pub fn new(
        api_key: impl Into<String>,
        environment: Environment,
        dry_run: bool,
        show_errors_in_webview: bool,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            environment,
            dry_run,
            show_errors_in_webview,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// First 16 hex chars of the key's SHA-256. Safe to log and to embed
    /// in proofs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.api_key.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("dry_run", &self.dry_run)
            .field("show_errors_in_webview", &self.show_errors_in_webview)
            .finish()
    }
}

/// Lifecycle state. `Failed` is terminal.
#[derive(Debug, Clone)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready(Arc<Credential>),
    Failed(String),
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Ready(_) => "ready",
            EngineState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }
}
