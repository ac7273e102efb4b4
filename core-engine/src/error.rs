use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Stable, host-visible error codes.
///
/// `as_str` is what the boundary puts in the `code` field of its error
/// envelope; `status` is the non-zero response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidState,
    UnknownOperation,
    InvalidParams,
    UpstreamFailure,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidState => "InvalidState",
            ErrorCode::UnknownOperation => "UnknownOperation",
            ErrorCode::InvalidParams => "InvalidParams",
            ErrorCode::UpstreamFailure => "UpstreamFailure",
            ErrorCode::Timeout => "Timeout",
            ErrorCode::Cancelled => "Cancelled",
            ErrorCode::Internal => "Internal",
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            ErrorCode::InvalidState => 1,
            ErrorCode::UnknownOperation => 2,
            ErrorCode::InvalidParams => 3,
            ErrorCode::UpstreamFailure => 4,
            ErrorCode::Timeout => 5,
            ErrorCode::Cancelled => 6,
            ErrorCode::Internal => 7,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request failure. Returned inside [`OpacityResult`](crate::OpacityResult),
/// never raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine not ready: {0}")]
    InvalidState(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Upstream failure{}: {detail}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    UpstreamFailure { status: Option<u16>, detail: String },

    #[error("Interactive flow did not complete within {after:?}")]
    Timeout { after: Duration },

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::UnknownOperation(_) => ErrorCode::UnknownOperation,
            EngineError::InvalidParams(_) => ErrorCode::InvalidParams,
            EngineError::UpstreamFailure { .. } => ErrorCode::UpstreamFailure,
            EngineError::Timeout { .. } => ErrorCode::Timeout,
            EngineError::Cancelled(_) => ErrorCode::Cancelled,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Upstream answered 401 or 403: the session it was given is no good.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::UpstreamFailure {
                status: Some(401 | 403),
                ..
            }
        )
    }

    pub(crate) fn upstream(status: Option<u16>, detail: impl Into<String>) -> Self {
        EngineError::UpstreamFailure {
            status,
            detail: detail.into(),
        }
    }
}

impl From<BridgeError> for EngineError {
    fn from(err: BridgeError) -> Self {
        EngineError::Internal(format!("Host capability failed: {}", err))
    }
}

/// `init` failure. Every variant except `AlreadyInitialized` leaves the
/// engine permanently failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InitError {
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("Unsupported environment code: {0}")]
    UnsupportedEnvironment(i32),

    #[error("Engine already initialized")]
    AlreadyInitialized,

    #[error("Engine initialization previously failed: {reason}")]
    Terminal { reason: String },

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl InitError {
    /// Stable code for the boundary's error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            InitError::InvalidApiKey(_) => "InvalidApiKey",
            InitError::UnsupportedEnvironment(_) => "UnsupportedEnvironment",
            InitError::AlreadyInitialized => "AlreadyInitialized",
            InitError::Terminal { .. } => "Terminal",
            InitError::HandshakeFailed(_) => "HandshakeFailed",
            InitError::CapabilityMissing { .. } => "CapabilityMissing",
            InitError::Config(_) => "Config",
        }
    }

    /// Non-zero `init` status.
    pub fn status(&self) -> i32 {
        match self {
            InitError::InvalidApiKey(_) => 1,
            InitError::UnsupportedEnvironment(_) => 2,
            InitError::AlreadyInitialized => 3,
            InitError::Terminal { .. } => 4,
            InitError::HandshakeFailed(_) => 5,
            InitError::CapabilityMissing { .. } => 6,
            InitError::Config(_) => 7,
        }
    }
}

impl From<core_runtime::Error> for InitError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => InitError::CapabilityMissing {
                capability,
                message,
            },
            core_runtime::Error::Config(msg) => InitError::Config(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
