//! Error handling for the reconciliation core
//!
//! Only failures the caller can act on cross the library boundary. Errors
//! from the verification and enrichment capabilities are absorbed where they
//! happen and written to the operational log instead.

use thiserror::Error;

/// Main error type for the reconciliation core
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Store at '{path}' could not be opened read-write or read-only: {message}")]
    StoreUnavailable { path: String, message: String },

    #[error("Store is open read-only; '{operation}' requires write access")]
    ReadOnly { operation: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<serde_yaml::Error> for ReconcileError {
    fn from(error: serde_yaml::Error) -> Self {
        ReconcileError::Config {
            message: error.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ReconcileError>;
