pub mod builder;

use std::path::PathBuf;

use serde::Serialize;

/// Snapshot of a running coordination-server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub pid: u32,
    pub host: String,
    pub port: u16,
    /// `host:port`, the value clients pass as their connect string.
    pub connect_string: String,
    pub data_dir: PathBuf,
}
