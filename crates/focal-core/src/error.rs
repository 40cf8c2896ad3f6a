//! Error types for Focal.

use thiserror::Error;

/// Result type alias using the core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation-level errors surfaced synchronously to callers.
#[derive(Error, Debug)]
pub enum Error {
    /// Path is empty or escapes its root after normalization
    #[error("invalid resource path: {0}")]
    InvalidPath(String),

    /// Token budget must be a positive integer
    #[error("token budget must be positive (got {0})")]
    InvalidBudget(u64),

    /// Operation attempted on a disposed coordinator
    #[error("coordinator has been disposed")]
    Disposed,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
