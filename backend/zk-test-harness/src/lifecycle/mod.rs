//! Per-test lifecycle of a coordination-server instance.
//!
//! State machine:
//!
//! ```text
//! Absent  --before()-->  Running
//! Running --stop()-->    Stopped    --start()--> Running
//! Running --restart()--> Running    (Stopped if the restart left it down)
//! any     --after()-->   Absent
//! ```
//!
//! Each test context owns its own manager. Lifecycle operations take
//! `&mut self`, so sequential use is enforced by the borrow checker rather
//! than by a lock.

mod instance_state;

pub use instance_state::InstanceState;

use crate::config::TestingServerConfig;
use crate::error::lifecycle::LifecycleError;
use crate::server::testing_server::ZooKeeperServerFactory;
use crate::server::{CoordinationServer, ServerFactory};

use common::ErrorLocation;
use models::TestContext;

use std::panic::Location;

use log::{debug, info, warn};

/// Owns zero or one coordination-server instance on behalf of a test unit.
pub struct InstanceLifecycleManager<F: ServerFactory> {
    factory: F,
    state: InstanceState<F::Server>,
    teardown_failures: u64,
}

impl InstanceLifecycleManager<ZooKeeperServerFactory> {
    /// Manager spawning standalone ZooKeeper processes configured by `config`.
    pub fn zookeeper(config: TestingServerConfig) -> Self {
        Self::new(ZooKeeperServerFactory::new(config))
    }
}

impl<F: ServerFactory> InstanceLifecycleManager<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            state: InstanceState::Absent,
            teardown_failures: 0,
        }
    }

    /// Start a fresh instance for the test unit identified by `context`.
    ///
    /// Any instance still held from an earlier unit is torn down first, the
    /// same way [`after`](Self::after) would. Returns once the new instance
    /// accepts connections.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Start`] wrapping the factory's error. The manager is
    /// left `Absent`.
    pub async fn before(&mut self, context: &TestContext) -> Result<(), LifecycleError> {
        if !self.state.is_absent() {
            warn!(
                "{context}: replacing leaked {} coordination server",
                self.state.name()
            );
            self.terminate(context).await;
        }

        debug!("{context}: starting coordination server");

        let server = self
            .factory
            .create_started()
            .await
            .map_err(|source| LifecycleError::Start {
                message: format!("Could not start coordination server for {context}"),
                location: ErrorLocation::from(Location::caller()),
                source,
            })?;

        info!(
            "{context}: coordination server ready at {}",
            server.connect_string()
        );

        self.state = InstanceState::Running(server);
        Ok(())
    }

    /// Tear down whatever instance is held. Never fails.
    ///
    /// Teardown errors are logged as warnings and counted in
    /// [`teardown_failures`](Self::teardown_failures); the manager ends up
    /// `Absent` either way.
    pub async fn after(&mut self, context: &TestContext) {
        if !self.terminate(context).await {
            debug!("{context}: no coordination server to terminate");
        }
    }

    /// The `host:port` connect string of the running instance.
    #[track_caller]
    pub fn connect_string(&self) -> Result<String, LifecycleError> {
        self.instance().map(CoordinationServer::connect_string)
    }

    /// The running instance.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::PreconditionFailed`] unless the state is `Running`.
    #[track_caller]
    pub fn instance(&self) -> Result<&F::Server, LifecycleError> {
        match &self.state {
            InstanceState::Running(server) => Ok(server),
            other => Err(not_running(other.name(), Location::caller())),
        }
    }

    /// Restart the running instance against the same data and port.
    ///
    /// If the restart fails and leaves the instance down, the manager moves to
    /// `Stopped` and still owns the instance for cleanup.
    pub async fn restart(&mut self) -> Result<(), LifecycleError> {
        let server = self.running_mut()?;
        let address = server.connect_string();

        info!("Restarting coordination server at {address}");

        let result = server.restart().await;
        let running = server.is_running();
        self.state.settle(running);

        result.map_err(|source| LifecycleError::Restart {
            message: format!("Could not restart coordination server at {address}"),
            location: ErrorLocation::from(Location::caller()),
            source,
        })?;

        info!("Coordination server at {address} restarted");
        Ok(())
    }

    /// Stop the running instance, keeping it for a later [`start`](Self::start).
    ///
    /// Afterwards [`connect_string`](Self::connect_string) fails until the
    /// instance is started again.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        let server = self.running_mut()?;
        let address = server.connect_string();

        info!("Stopping coordination server at {address}");

        let result = server.stop().await;
        let running = server.is_running();
        self.state.settle(running);

        result.map_err(|source| LifecycleError::Stop {
            message: format!("Could not stop coordination server at {address}"),
            location: ErrorLocation::from(Location::caller()),
            source,
        })?;

        info!("Coordination server at {address} stopped");
        Ok(())
    }

    /// Resume a stopped instance. Already running is a no-op.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        let server = match &mut self.state {
            InstanceState::Stopped(server) => server,
            InstanceState::Running(server) => {
                debug!(
                    "Coordination server at {} already running",
                    server.connect_string()
                );
                return Ok(());
            }
            InstanceState::Absent => {
                return Err(not_running("absent", Location::caller()));
            }
        };

        let address = server.connect_string();
        info!("Resuming coordination server at {address}");

        let result = server.start().await;
        let running = server.is_running();
        self.state.settle(running);

        result.map_err(|source| LifecycleError::Resume {
            message: format!("Could not resume coordination server at {address}"),
            location: ErrorLocation::from(Location::caller()),
            source,
        })
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn state(&self) -> &InstanceState<F::Server> {
        &self.state
    }

    /// Number of teardowns whose errors were absorbed.
    pub fn teardown_failures(&self) -> u64 {
        self.teardown_failures
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn running_mut(&mut self) -> Result<&mut F::Server, LifecycleError> {
        match &mut self.state {
            InstanceState::Running(server) => Ok(server),
            other => Err(not_running(other.name(), Location::caller())),
        }
    }

    /// Close and forget the held instance. Returns whether there was one.
    async fn terminate(&mut self, context: &TestContext) -> bool {
        let Some(mut server) = self.state.take() else {
            return false;
        };

        let address = server.connect_string();

        match server.close().await {
            Ok(()) => debug!("{context}: coordination server at {address} terminated"),
            Err(e) => {
                self.teardown_failures += 1;
                warn!(
                    "{context}: could not properly terminate the coordination server at {address}: {e}"
                );
            }
        }

        true
    }
}

impl<F: ServerFactory> Drop for InstanceLifecycleManager<F> {
    fn drop(&mut self) {
        if !self.state.is_absent() {
            warn!(
                "Lifecycle manager dropped holding a {} coordination server; after() was never called",
                self.state.name()
            );
        }
    }
}

fn not_running(state: &str, location: &'static Location<'static>) -> LifecycleError {
    LifecycleError::PreconditionFailed {
        message: format!("instance not running (state: {state})"),
        location: ErrorLocation::from(location),
    }
}
