use common::ErrorLocation;
use models::ModelError;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ServerError {
    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Process Exited Error: {message} {location}")]
    ProcessExited {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Signal Error: {message} {location}")]
    Signal {
        message: String,
        location: ErrorLocation,
    },

    #[error("Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ModelError> for ServerError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation { message, location } => {
                ServerError::Validation { message, location }
            }
        }
    }
}
