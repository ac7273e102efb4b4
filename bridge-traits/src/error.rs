use thiserror::Error;

/// Failure of a host capability call.
///
/// Absence is never an error here: unset secrets and missing cookies come
/// back as `None`.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide this capability at all (no keychain, no
    /// network stack).
    #[error("Host capability not available: {0}")]
    NotAvailable(String),

    #[error("Host capability call failed: {0}")]
    OperationFailed(String),

    /// No browser surface is prepared for the flow.
    #[error("No browser surface for flow {0}")]
    BrowserInactive(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
