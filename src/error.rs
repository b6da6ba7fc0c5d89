//! Error types for linechat.

use thiserror::Error;

use crate::chat::RegistryError;

/// Common error type for linechat.
#[derive(Error, Debug)]
pub enum ChatError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// User registry rejected the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type alias for linechat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
