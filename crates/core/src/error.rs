//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("lyrics too long: {length} characters (maximum {max})")]
    TextTooLong { length: usize, max: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
