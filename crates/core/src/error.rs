//! Error types for the presentation subsystem.

use thiserror::Error;

/// Main error type for window, configuration and startup failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),}

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
