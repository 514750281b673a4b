//! The coordination-server seam and its ZooKeeper implementation.
//!
//! [`InstanceLifecycleManager`](crate::InstanceLifecycleManager) only talks to
//! the [`CoordinationServer`] and [`ServerFactory`] traits. The shipped
//! implementation, [`testing_server::ZooKeeperTestingServer`], runs a
//! standalone ZooKeeper process per instance. Tests of the manager itself can
//! plug in an in-memory fake.

pub mod process;
pub mod testing_server;

use crate::error::server::ServerError;

use async_trait::async_trait;

/// A single coordination-server instance the harness can drive.
///
/// `stop` is resumable: the data directory and port survive, and `start`
/// brings the same instance back. `close` is final and releases everything.
#[async_trait]
pub trait CoordinationServer: Send {
    /// `host:port` clients use to connect. Stable for the life of the instance.
    fn connect_string(&self) -> String;

    fn is_running(&self) -> bool;

    /// Start (or resume) the instance, returning once it accepts connections.
    async fn start(&mut self) -> Result<(), ServerError>;

    async fn stop(&mut self) -> Result<(), ServerError>;

    /// Stop then start against the same data directory and port.
    async fn restart(&mut self) -> Result<(), ServerError>;

    /// Stop if running and release all resources. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), ServerError>;
}

/// Creates fresh, already started instances.
#[async_trait]
pub trait ServerFactory: Send + Sync {
    type Server: CoordinationServer;

    /// Build and start a new instance. On error nothing is left running.
    async fn create_started(&self) -> Result<Self::Server, ServerError>;
}
