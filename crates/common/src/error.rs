//! Error types for bloglist data

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
