//! Error types for Vigil.

use thiserror::Error;

/// The main error type for Vigil setup and wiring.
///
/// Nothing in here is ever raised on behalf of an audited call; these errors
/// only surface while the host application assembles its audit runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new logging error.
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }
}

/// Result type alias using Vigil's Error.
pub type Result<T> = std::result::Result<T, Error>;
