//! Error types for Coshell Core
//!
//! Tool-level failures never surface as Rust errors across the dispatch
//! boundary; tools convert them into `isError:true` envelopes. The
//! types here cover session lifecycle and server configuration.

use thiserror::Error;

/// Result type alias using Coshell Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coshell error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session startup failed: {message}")]
    Startup { message: String },

    #[error("Invalid session parameters: {0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
