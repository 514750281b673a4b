use crate::error::model_error::ModelError;
use crate::{ErrorLocation, InstanceInfo};

use std::panic::Location;
use std::path::PathBuf;

/// Builder for creating validated [`InstanceInfo`] values.
///
/// The connect string is derived from host and port, so it can never
/// disagree with them.
#[derive(Debug, Default)]
pub struct InstanceInfoBuilder {
    pid: Option<u32>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
}

impl InstanceInfoBuilder {
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Build the InstanceInfo with validation.
    #[track_caller]
    pub fn build(self) -> Result<InstanceInfo, ModelError> {
        let pid = self.pid.ok_or_else(|| ModelError::Validation {
            message: String::from("PID is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if pid == 0 {
            return Err(ModelError::Validation {
                message: String::from("PID must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let host = self.host.ok_or_else(|| ModelError::Validation {
            message: String::from("Host is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if host.is_empty() || host.contains(char::is_whitespace) || host.contains(':') {
            return Err(ModelError::Validation {
                message: format!("Invalid host: '{host}'"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let port = self.port.ok_or_else(|| ModelError::Validation {
            message: String::from("Port is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if port == 0 {
            return Err(ModelError::Validation {
                message: String::from("Port must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let data_dir = self.data_dir.ok_or_else(|| ModelError::Validation {
            message: String::from("Data directory is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(InstanceInfo {
            pid,
            connect_string: format!("{host}:{port}"),
            host,
            port,
            data_dir,
        })
    }
}
