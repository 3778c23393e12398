//! Error types for Flowgate

use thiserror::Error;

/// Main error type for Flowgate
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Control plane is already running")]
    AlreadyRunning,

    #[error("Control plane is not running")]
    NotRunning,
}

/// Result type alias for Flowgate
pub type Result<T> = std::result::Result<T, Error>;
