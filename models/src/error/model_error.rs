use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a model is built from incomplete or inconsistent parts.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ModelError {
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },
}
