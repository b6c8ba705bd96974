use thiserror::Error;

/// Core error types for scribe object handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid object: {message}")]
    InvalidObject { message: String },

    #[error("Invalid apiVersion: {0}")]
    InvalidApiVersion(String),
}

impl CoreError {
    /// Create a new InvalidObject error
    pub fn invalid_object(message: impl Into<String>) -> Self {
        Self::InvalidObject {
            message: message.into(),
        }
    }

    /// Create a new InvalidApiVersion error
    pub fn invalid_api_version(api_version: impl Into<String>) -> Self {
        Self::InvalidApiVersion(api_version.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
