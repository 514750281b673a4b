use crate::support::fake_server::FakeFactory;

use zk_test_harness::{InstanceLifecycleManager, InstanceState, LifecycleError, ServerError};

use models::TestContext;

// ============================================================================
// Public API tests for the lifecycle manager
// Driven through an in-memory server so every transition is deterministic
// ============================================================================

fn manager() -> (InstanceLifecycleManager<FakeFactory>, FakeFactory) {
    let factory = FakeFactory::default();
    (InstanceLifecycleManager::new(factory.clone()), factory)
}

fn assert_precondition_failed<T: std::fmt::Debug>(result: Result<T, LifecycleError>) {
    match result {
        Err(LifecycleError::PreconditionFailed { message, .. }) => {
            assert!(
                message.contains("instance not running"),
                "Unexpected message: {message}"
            );
        }
        other => panic!("Expected PreconditionFailed, got {other:?}"),
    }
}

// ----------------------------------------------------------------------------
// after() - teardown
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that teardown is idempotent, including when nothing was ever started.
///
/// **WHY THIS MATTERS**: Test frameworks run `after` even when `before` failed or was skipped.
/// A teardown that errors on an empty manager would mask the real failure.
///
/// **BUG THIS CATCHES**: Would catch a teardown that assumes an instance exists, or one that
/// counts a no-op teardown as a failure.
#[tokio::test]
async fn given_never_started_when_after_called_twice_then_stays_absent_without_warnings() {
    // GIVEN: A fresh manager
    let (mut manager, factory) = manager();
    let context = TestContext::new("teardown_without_setup");

    // WHEN: Tearing down twice
    manager.after(&context).await;
    manager.after(&context).await;

    // THEN: Still absent, nothing closed, nothing counted
    assert!(manager.state().is_absent());
    assert_eq!(manager.teardown_failures(), 0);
    assert!(factory.journal().events.is_empty());
}

/// **VALUE**: Verifies that a started instance is closed exactly once across repeated teardowns.
#[tokio::test]
async fn given_running_instance_when_after_called_twice_then_closed_once() {
    // GIVEN: A running instance
    let (mut manager, factory) = manager();
    let context = TestContext::new("double_teardown");
    manager.before(&context).await.unwrap();

    // WHEN: Tearing down twice
    manager.after(&context).await;
    manager.after(&context).await;

    // THEN: Absent, one close, no live instances
    assert!(manager.state().is_absent());
    let journal = factory.journal();
    assert_eq!(journal.events, vec!["create:1", "close:1"]);
    assert_eq!(journal.live(), 0);
}

/// **VALUE**: Verifies that a failing teardown is absorbed and still leaves the manager absent.
///
/// **WHY THIS MATTERS**: An error thrown from teardown would replace the test's own failure and can
/// abort the rest of a suite's teardown chain.
///
/// **BUG THIS CATCHES**: Would catch if the state were cleared only after a successful close,
/// leaving a dead handle behind for the next test.
#[tokio::test]
async fn given_failing_close_when_after_called_then_returns_normally_and_counts_failure() {
    // GIVEN: A running instance whose close fails
    let (mut manager, factory) = manager();
    let context = TestContext::new("teardown_failure");
    manager.before(&context).await.unwrap();
    factory.fail(|f| f.close = true);

    // WHEN: Tearing down
    manager.after(&context).await;

    // THEN: Absent, failure counted, address no longer available
    assert!(manager.state().is_absent());
    assert_eq!(manager.teardown_failures(), 1);
    assert_precondition_failed(manager.connect_string());
}

// ----------------------------------------------------------------------------
// Preconditions
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that address, restart and stop fail fast before `before()` has run.
///
/// **WHY THIS MATTERS**: Querying the address too early is a test-authoring bug. It must produce a
/// clearly labelled error, not a hang or a bogus address.
///
/// **BUG THIS CATCHES**: Would catch an operation that lazily starts an instance, or one that
/// touches the factory while absent.
#[tokio::test]
async fn given_absent_manager_when_operations_called_then_precondition_failed_without_side_effects()
{
    // GIVEN: A fresh manager
    let (mut manager, factory) = manager();

    // WHEN / THEN: Each operation fails with PreconditionFailed
    assert_precondition_failed(manager.connect_string());
    assert_precondition_failed(manager.restart().await);
    assert_precondition_failed(manager.stop().await);
    assert!(manager.start().await.unwrap_err().is_precondition_failed());

    // AND: Nothing happened
    assert!(manager.state().is_absent());
    assert!(factory.journal().events.is_empty());
}

/// **VALUE**: Verifies precondition errors point at the test line that made the call.
#[tokio::test]
async fn given_absent_manager_when_connect_string_queried_then_error_location_is_caller() {
    // GIVEN: A fresh manager
    let (manager, _factory) = manager();

    // WHEN: Querying the address
    let err = manager.connect_string().unwrap_err();

    // THEN: The location is this file, not the manager's source
    let rendered = err.to_string();
    assert!(rendered.starts_with("Precondition Failed: instance not running"));
    assert!(rendered.contains("manager.rs"), "Location missing: {rendered}");
    assert!(!rendered.contains("lifecycle/mod.rs"), "Wrong location: {rendered}");
}

// ----------------------------------------------------------------------------
// before() - fresh instance
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that a second `before()` replaces a leaked instance with a fresh one.
///
/// **WHY THIS MATTERS**: If a previous test never reached `after`, its instance must not leak
/// into the next test, and the next test must not be handed the stale address.
///
/// **BUG THIS CATCHES**: Would catch a `before()` that keeps the old instance, or one that starts
/// a second instance without closing the first.
#[tokio::test]
async fn given_running_instance_when_before_called_again_then_exactly_one_fresh_instance() {
    // GIVEN: A running instance
    let (mut manager, factory) = manager();
    let context = TestContext::new("leaked_instance");
    manager.before(&context).await.unwrap();
    let stale = manager.connect_string().unwrap();

    // WHEN: Setting up again
    manager.before(&context).await.unwrap();

    // THEN: One live instance, the new one
    let fresh = manager.connect_string().unwrap();
    assert_ne!(fresh, stale);
    let journal = factory.journal();
    assert_eq!(journal.events, vec!["create:1", "close:1", "create:2"]);
    assert_eq!(journal.live(), 1);
    drop(journal);

    manager.after(&context).await;
}

/// **VALUE**: Verifies that `before()` replaces a stopped leftover instance even when closing it fails.
///
/// **WHY THIS MATTERS**: Setup absorbs teardown errors the same way `after()` does. A broken
/// close of the previous test's instance must not fail the next test's setup.
///
/// **BUG THIS CATCHES**: Would catch a `before()` that only clears `Running` leftovers, one that
/// propagates the close error, or one that forgets to count it.
#[tokio::test]
async fn given_stopped_leak_with_failing_close_when_before_called_then_replaced_and_failure_counted()
{
    // GIVEN: A stopped instance whose close will fail
    let (mut manager, factory) = manager();
    let context = TestContext::new("stopped_leak_failing_close");
    manager.before(&context).await.unwrap();
    manager.stop().await.unwrap();
    factory.fail(|f| f.close = true);

    // WHEN: Setting up again
    let result = manager.before(&context).await;

    // THEN: Setup succeeds with a fresh instance and the close failure is counted
    assert!(result.is_ok(), "before() should absorb the close failure: {result:?}");
    assert!(manager.is_running());
    assert_eq!(manager.teardown_failures(), 1);
    assert_eq!(
        factory.journal().events,
        vec!["create:1", "stop:1", "close:1", "create:2"]
    );

    // THEN: Only the fresh instance is live once closes work again
    factory.fail(|f| f.close = false);
    assert_eq!(factory.journal().live(), 1);
    manager.after(&context).await;
    assert_eq!(factory.journal().live(), 0);
}

/// **VALUE**: Verifies that a failed start leaves the manager absent and passes the error through.
///
/// **WHY THIS MATTERS**: The harness adds no retries; the test must see the real cause (e.g. the
/// ZooKeeper launcher is missing) rather than a generic message.
#[tokio::test]
async fn given_failing_start_when_before_called_then_absent_and_underlying_error_preserved() {
    // GIVEN: A factory that fails to start
    let (mut manager, factory) = manager();
    factory.fail(|f| f.start = true);

    // WHEN: Setting up
    let err = manager
        .before(&TestContext::new("start_failure"))
        .await
        .unwrap_err();

    // THEN: Start error wrapping the spawn error, manager absent
    assert!(matches!(err, LifecycleError::Start { .. }));
    assert!(matches!(err.server_error(), Some(ServerError::Spawn { .. })));
    assert!(manager.state().is_absent());
    assert_eq!(factory.journal().live(), 0);
}

// ----------------------------------------------------------------------------
// restart() / stop() / start()
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies restart keeps the instance running at the same address.
///
/// **WHY THIS MATTERS**: Tests use restart to check that clients reconnect. A moved address would
/// test the wrong thing.
#[tokio::test]
async fn given_running_instance_when_restarted_then_still_running_at_same_address() {
    // GIVEN: A running instance
    let (mut manager, factory) = manager();
    let context = TestContext::new("restart");
    manager.before(&context).await.unwrap();
    let before_restart = manager.connect_string().unwrap();

    // WHEN: Restarting
    manager.restart().await.unwrap();

    // THEN: Running, same address, same instance
    assert!(manager.is_running());
    assert_eq!(manager.connect_string().unwrap(), before_restart);
    assert_eq!(factory.journal().events, vec!["create:1", "restart:1"]);

    manager.after(&context).await;
}

/// **VALUE**: Verifies a restart failure that leaves the server down moves the manager to `Stopped`.
///
/// **BUG THIS CATCHES**: Would catch a manager that keeps reporting `Running` for a dead instance,
/// or one that drops the instance without closing it.
#[tokio::test]
async fn given_restart_leaving_server_down_when_restarted_then_stopped_and_still_closed_on_after() {
    // GIVEN: A running instance whose restart fails half way
    let (mut manager, factory) = manager();
    let context = TestContext::new("restart_failure");
    manager.before(&context).await.unwrap();
    factory.fail(|f| f.restart_leaves_stopped = true);

    // WHEN: Restarting
    let err = manager.restart().await.unwrap_err();

    // THEN: Restart error, stopped, address unavailable
    assert!(matches!(err, LifecycleError::Restart { .. }));
    assert!(matches!(manager.state(), InstanceState::Stopped(_)));
    assert_precondition_failed(manager.connect_string());

    // AND: Teardown still closes it
    manager.after(&context).await;
    assert_eq!(factory.journal().live(), 0);
}

/// **VALUE**: Verifies a restart failure that leaves the server up keeps the manager `Running`.
#[tokio::test]
async fn given_restart_failing_but_server_up_when_restarted_then_still_running() {
    // GIVEN: A running instance whose restart fails cleanly
    let (mut manager, factory) = manager();
    let context = TestContext::new("restart_failure_running");
    manager.before(&context).await.unwrap();
    factory.fail(|f| f.restart = true);

    // WHEN: Restarting
    let result = manager.restart().await;

    // THEN: Error surfaced, still running
    assert!(result.is_err());
    assert!(manager.is_running());

    manager.after(&context).await;
}

/// **VALUE**: Covers the full stop scenario: address, stop, precondition failure, quiet teardown.
///
/// **WHY THIS MATTERS**: This is the canonical failure-injection flow tests use to check how
/// clients behave when the server disappears.
#[tokio::test]
async fn given_running_instance_when_stopped_then_address_fails_and_after_is_quiet() {
    // GIVEN: A running instance
    let (mut manager, factory) = manager();
    let context = TestContext::new("stop_scenario");
    manager.before(&context).await.unwrap();

    // WHEN: Reading the address then stopping
    let address = manager.connect_string().unwrap();
    manager.stop().await.unwrap();

    // THEN: Address was host:port, now unavailable
    let (host, port) = address.split_once(':').expect("address should be host:port");
    assert!(!host.is_empty());
    assert!(port.parse::<u16>().is_ok());
    assert_precondition_failed(manager.connect_string());
    assert_precondition_failed(manager.stop().await);

    // AND: Teardown returns normally without counting a failure
    manager.after(&context).await;
    assert!(manager.state().is_absent());
    assert_eq!(manager.teardown_failures(), 0);
    assert_eq!(
        factory.journal().events,
        vec!["create:1", "stop:1", "close:1"]
    );
}

/// **VALUE**: Verifies a stopped instance can be resumed at the same address.
///
/// **WHY THIS MATTERS**: Stop is resumable; tests use stop/start to simulate an outage of known
/// length against the same data.
#[tokio::test]
async fn given_stopped_instance_when_started_then_running_again_at_same_address() {
    // GIVEN: A stopped instance
    let (mut manager, factory) = manager();
    let context = TestContext::new("resume");
    manager.before(&context).await.unwrap();
    let address = manager.connect_string().unwrap();
    manager.stop().await.unwrap();

    // WHEN: Starting again (twice; the second is a no-op)
    manager.start().await.unwrap();
    manager.start().await.unwrap();

    // THEN: Running at the same address, resumed once
    assert!(manager.is_running());
    assert_eq!(manager.connect_string().unwrap(), address);
    assert_eq!(
        factory.journal().events,
        vec!["create:1", "stop:1", "start:1"]
    );

    manager.after(&context).await;
}

/// **VALUE**: Verifies a failing stop surfaces the error and keeps the instance running.
#[tokio::test]
async fn given_failing_stop_when_stopped_then_error_and_still_running() {
    // GIVEN: A running instance whose stop fails
    let (mut manager, factory) = manager();
    let context = TestContext::new("stop_failure");
    manager.before(&context).await.unwrap();
    factory.fail(|f| f.stop = true);

    // WHEN: Stopping
    let err = manager.stop().await.unwrap_err();

    // THEN: Stop error carrying the injected cause, still running
    assert!(matches!(err, LifecycleError::Stop { .. }));
    assert!(matches!(err.server_error(), Some(ServerError::Signal { .. })));
    assert!(manager.is_running());

    manager.after(&context).await;
}
