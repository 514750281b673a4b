use zk_test_harness::{
    CoordinationServer, ServerError, ServerFactory, TestingServerConfig, ZooKeeperServerFactory,
    ZooKeeperTestingServer,
};

use serial_test::serial;

// ============================================================================
// Public API tests for the ZooKeeper process implementation
// ============================================================================

/// **VALUE**: Verifies stop/start/close on a real instance keeps the address and frees everything.
///
/// **WHY THIS MATTERS**: Resumable stop is what lets tests simulate an outage against the same
/// data. Close must then release the process and the directory.
///
/// **ENVIRONMENT-DEPENDENT**: This test passes in all environments:
/// - No ZooKeeper installed → `start()` returns `ServerError::Spawn` (expected)
/// - ZooKeeper installed → the instance is stopped, resumed and closed
#[tokio::test]
#[serial]
async fn given_any_environment_when_stopping_and_resuming_then_handles_gracefully() {
    // GIVEN: A prepared instance
    let config = TestingServerConfig::from_env().expect("environment config should be valid");
    let mut server = ZooKeeperTestingServer::new(config).expect("instance should be prepared");
    let address = server.connect_string();

    // WHEN: Starting
    match server.start().await {
        Ok(()) => {
            // THEN: Stop is resumable at the same address
            assert!(server.is_running());
            server.stop().await.unwrap();
            assert!(!server.is_running());
            assert!(server.info().unwrap().is_none());

            server.start().await.unwrap();
            assert!(server.is_running());
            assert_eq!(server.connect_string(), address);
            let pid = server.info().unwrap().map(|info| info.pid);
            assert!(pid.is_some_and(|pid| pid > 0));
        }
        Err(ServerError::Spawn { .. })
        | Err(ServerError::ProcessExited { .. })
        | Err(ServerError::Timeout { .. }) => {
            // Expected: launcher missing or broken
            assert!(!server.is_running());
        }
        Err(other) => panic!("Unexpected start error: {other}"),
    }

    // AND: Close always succeeds and is final
    let workspace = server.workspace_dir().map(|p| p.to_path_buf());
    server.close().await.unwrap();
    assert!(server.is_closed());
    assert!(workspace.is_some_and(|p| !p.exists()));
}

/// **VALUE**: Verifies the factory hands back nothing when start fails.
///
/// **BUG THIS CATCHES**: Would catch a factory that returns a prepared but unstarted instance on
/// failure, which the manager would then treat as running.
#[tokio::test]
async fn given_missing_launcher_when_factory_creates_then_returns_spawn_error() {
    // GIVEN: A factory with a launcher that does not exist
    let factory = ZooKeeperServerFactory::new(TestingServerConfig {
        binary: "/nonexistent/zkServer.sh".to_string(),
        ..TestingServerConfig::default()
    });

    // WHEN: Creating an instance
    let result = factory.create_started().await;

    // THEN: Spawn error
    assert!(matches!(result, Err(ServerError::Spawn { .. })));
    assert_eq!(factory.config().binary, "/nonexistent/zkServer.sh");
}
