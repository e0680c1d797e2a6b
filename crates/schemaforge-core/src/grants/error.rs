//! Grant store errors.

use thiserror::Error;

/// Errors raised by grant stores.
#[derive(Debug, Error)]
pub enum GrantError {
    /// Storage error in the underlying database.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),

    /// A grant record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored grant record could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Result type for grant operations.
pub type GrantResult<T> = Result<T, GrantError>;
