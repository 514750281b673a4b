//! Lifecycle management for a throwaway ZooKeeper instance inside automated tests.
//!
//! A test framework calls [`InstanceLifecycleManager::before`] ahead of a test
//! unit and [`InstanceLifecycleManager::after`] once it finishes. In between,
//! test code reads the connect string and may stop or restart the instance to
//! exercise failure handling in the code under test.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logger;
pub mod server;

#[cfg(test)]
mod tests;

pub use config::TestingServerConfig;
pub use error::HarnessError;
pub use error::lifecycle::LifecycleError;
pub use error::server::ServerError;
pub use lifecycle::{InstanceLifecycleManager, InstanceState};
pub use server::testing_server::{ZooKeeperServerFactory, ZooKeeperTestingServer};
pub use server::{CoordinationServer, ServerFactory};

pub const ZOOKEEPER_SERVER_BINARY: &str = "zkServer.sh";
pub const LOOPBACK_HOSTNAME: &str = "127.0.0.1";
