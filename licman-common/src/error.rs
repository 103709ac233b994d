//! Common error types for the license manager

use thiserror::Error;

/// Common result type for license manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A submitted batch contained records, none of which were valid
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
