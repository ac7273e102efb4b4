use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Engine init error: {0}")]
    Init(#[from] core_engine::InitError),
}

impl From<core_runtime::Error> for CoreError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            core_runtime::Error::Config(msg) => CoreError::InitializationFailed(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
