use crate::error::server::ServerError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors surfaced by [`InstanceLifecycleManager`](crate::InstanceLifecycleManager).
///
/// `PreconditionFailed` is a test-authoring defect: an operation that needs a
/// running instance was called before `before` or after `stop`/`after`. The
/// other variants carry the underlying [`ServerError`] untouched as their source.
#[derive(Debug, ThisError)]
pub enum LifecycleError {
    #[error("Precondition Failed: {message} {location}")]
    PreconditionFailed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Start Error: {message} {location}")]
    Start {
        message: String,
        location: ErrorLocation,
        #[source]
        source: ServerError,
    },

    #[error("Stop Error: {message} {location}")]
    Stop {
        message: String,
        location: ErrorLocation,
        #[source]
        source: ServerError,
    },

    #[error("Restart Error: {message} {location}")]
    Restart {
        message: String,
        location: ErrorLocation,
        #[source]
        source: ServerError,
    },

    #[error("Resume Error: {message} {location}")]
    Resume {
        message: String,
        location: ErrorLocation,
        #[source]
        source: ServerError,
    },
}

impl LifecycleError {
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, LifecycleError::PreconditionFailed { .. })
    }

    /// The underlying server failure, if this error wraps one.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            LifecycleError::PreconditionFailed { .. } => None,
            LifecycleError::Start { source, .. }
            | LifecycleError::Stop { source, .. }
            | LifecycleError::Restart { source, .. }
            | LifecycleError::Resume { source, .. } => Some(source),
        }
    }
}
