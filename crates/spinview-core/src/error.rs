//! Error types for core data.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Mesh data that cannot be drawn as a triangle list
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
