//! Common error types shared across the poster-extraction crates.

use thiserror::Error;

/// Common result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the poster-extraction core and its collaborators.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
