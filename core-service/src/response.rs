//! Host-visible result objects.
//!
//! Every engine result crosses the boundary as a status-tagged object. Errors
//! travel as a JSON envelope `{"code": "...", "description": "..."}` that the
//! host turns back into an [`OpacityError`].

use core_engine::{EngineError, InitError, OpacityResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Status of a successful call.
pub const STATUS_OK: i32 = 0;

/// Code used when an error envelope cannot be read.
pub const UNKNOWN_ERROR: &str = "UnknownError";

/// Outcome of `get`: `status == 0` with `json` (and maybe `proof`), or a
/// non-zero status with `err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpacityResponse {
    pub status: i32,
    pub json: Option<String>,
    pub proof: Option<String>,
    pub err: Option<String>,
}

impl OpacityResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// The error carried by a failed response.
    pub fn error(&self) -> Option<OpacityError> {
        self.err.as_deref().map(OpacityError::from_envelope)
    }
}

impl From<OpacityResult> for OpacityResponse {
    fn from(result: OpacityResult) -> Self {
        match result {
            Ok(payload) => OpacityResponse {
                status: STATUS_OK,
                json: Some(payload.json),
                proof: payload.proof,
                err: None,
            },
            Err(error) => OpacityResponse {
                status: error.code().status(),
                json: None,
                proof: None,
                err: Some(ErrorEnvelope::from(&error).to_json()),
            },
        }
    }
}

/// Outcome of `init`: `status == 0`, or a non-zero status with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitStatus {
    pub status: i32,
    pub message: Option<String>,
}

impl InitStatus {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl From<Result<(), InitError>> for InitStatus {
    fn from(result: Result<(), InitError>) -> Self {
        match result {
            Ok(()) => InitStatus {
                status: STATUS_OK,
                message: None,
            },
            Err(error) => InitStatus {
                status: error.status(),
                message: Some(error.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorEnvelope {
    code: String,
    description: String,
}

impl ErrorEnvelope {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode error envelope");
            format!(r#"{{"code":"{}","description":""}}"#, self.code)
        })
    }
}

impl From<&EngineError> for ErrorEnvelope {
    fn from(error: &EngineError) -> Self {
        ErrorEnvelope {
            code: error.code().as_str().to_string(),
            description: error.to_string(),
        }
    }
}

/// Error as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpacityError {
    pub code: String,
    pub description: String,
}

impl OpacityError {
    /// Parse an error envelope. Anything unreadable becomes `UnknownError`
    /// with the raw text as description.
    pub fn from_envelope(raw: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(raw) {
            Ok(envelope) => OpacityError {
                code: envelope.code,
                description: envelope.description,
            },
            Err(_) => OpacityError {
                code: UNKNOWN_ERROR.to_string(),
                description: raw.to_string(),
            },
        }
    }
}

impl std::fmt::Display for OpacityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl std::error::Error for OpacityError {}
