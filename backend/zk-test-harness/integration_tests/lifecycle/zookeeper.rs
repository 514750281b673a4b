use zk_test_harness::logger::{DEFAULT_LOG_LEVEL, initialize};
use zk_test_harness::{
    InstanceLifecycleManager, LifecycleError, ServerError, ServerFactory, TestingServerConfig,
};

use models::TestContext;

use serial_test::serial;

// ============================================================================
// End-to-end lifecycle against a real ZooKeeper launcher
// ============================================================================

// Note: these tests need `zkServer.sh` on PATH (or ZK_TEST_SERVER_BIN) to exercise the full
// flow. Without it they verify that the failure surfaces as a typed start error.

/// **VALUE**: Verifies the full before / restart / stop / after flow never panics in any environment.
///
/// **WHY THIS MATTERS**: This is exactly how a test suite uses the harness. Whatever the machine
/// has installed, the harness must either work end to end or fail with a `Start` error that
/// names the underlying cause.
///
/// **ENVIRONMENT-DEPENDENT**: This test passes in all environments:
/// - No ZooKeeper installed → `before()` returns `LifecycleError::Start` (expected)
/// - ZooKeeper installed → full lifecycle runs and the instance is torn down
#[tokio::test]
#[serial]
async fn given_any_environment_when_running_full_lifecycle_then_handles_gracefully() {
    // GIVEN: A manager configured from the environment
    let _ = initialize(DEFAULT_LOG_LEVEL);
    let config = TestingServerConfig::from_env().expect("environment config should be valid");
    let mut manager = InstanceLifecycleManager::zookeeper(config);
    let context = TestContext::new("zookeeper_full_lifecycle");

    // WHEN: Setting up
    match manager.before(&context).await {
        Ok(()) => {
            // THEN: A real instance is reachable and survives a restart
            let address = manager.connect_string().unwrap();
            let info = manager.instance().unwrap().info().unwrap().unwrap();
            assert_eq!(info.connect_string, address);
            assert!(info.data_dir.is_dir());
            let workspace = manager.instance().unwrap().workspace_dir().unwrap().to_path_buf();

            manager.restart().await.unwrap();
            assert_eq!(manager.connect_string().unwrap(), address);

            manager.stop().await.unwrap();
            assert!(manager.connect_string().unwrap_err().is_precondition_failed());

            manager.after(&context).await;
            assert!(manager.state().is_absent());
            assert_eq!(manager.teardown_failures(), 0);
            assert!(!workspace.exists(), "Teardown should remove the data directory");
        }
        Err(err @ LifecycleError::Start { .. }) => {
            // Expected without ZooKeeper: the cause is preserved
            assert!(matches!(
                err.server_error(),
                Some(
                    ServerError::Spawn { .. }
                        | ServerError::ProcessExited { .. }
                        | ServerError::Timeout { .. }
                )
            ));
            assert!(manager.state().is_absent());
            manager.after(&context).await;
        }
        Err(other) => panic!("Unexpected error from before(): {other}"),
    }
}

/// **VALUE**: Verifies a missing launcher fails `before()` fast with the spawn cause attached.
///
/// **BUG THIS CATCHES**: Would catch a `before()` that swallows the spawn error, retries, or leaves
/// a half-constructed instance behind.
#[tokio::test]
async fn given_missing_launcher_when_before_called_then_start_error_and_absent() {
    // GIVEN: A manager pointing at a launcher that does not exist
    let config = TestingServerConfig {
        binary: "/nonexistent/zookeeper/bin/zkServer.sh".to_string(),
        ..TestingServerConfig::default()
    };
    let mut manager = InstanceLifecycleManager::zookeeper(config);
    let context = TestContext::new("missing_launcher");

    // WHEN: Setting up
    let err = manager.before(&context).await.unwrap_err();

    // THEN: Start error wrapping a spawn error, nothing held
    assert!(matches!(err, LifecycleError::Start { .. }));
    assert!(matches!(err.server_error(), Some(ServerError::Spawn { .. })));
    assert!(manager.state().is_absent());
    assert_precondition(&manager);

    manager.after(&context).await;
    assert_eq!(manager.teardown_failures(), 0);
}

fn assert_precondition<F: ServerFactory>(manager: &InstanceLifecycleManager<F>) {
    let err = manager.connect_string().unwrap_err();
    assert!(err.is_precondition_failed());
}

