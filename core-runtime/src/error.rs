use thiserror::Error;

/// Runtime setup errors: configuration, logging and missing capabilities.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
