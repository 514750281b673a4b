use zk_test_harness::{HarnessError, LifecycleError, ServerError};

use common::ErrorLocation;

use std::error::Error;
use std::panic::Location;

/// **VALUE**: Verifies precondition errors render kind, message and location.
///
/// **WHY THIS MATTERS**: This message is what a developer sees when a test queries the address
/// before setup. It has to say what went wrong and where.
#[test]
fn given_precondition_failed_when_formatted_then_includes_message_and_location() {
    // GIVEN: A precondition error
    let err = LifecycleError::PreconditionFailed {
        message: "instance not running (state: absent)".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Formatting
    let rendered = err.to_string();

    // THEN: Kind, message and file are present; no underlying cause
    assert!(rendered.contains("Precondition Failed"));
    assert!(rendered.contains("instance not running"));
    assert!(rendered.contains("lifecycle.rs"));
    assert!(err.is_precondition_failed());
    assert!(err.source().is_none());
    assert!(err.server_error().is_none());
}

/// **VALUE**: Verifies that wrapped server failures stay reachable through the source chain.
///
/// **WHY THIS MATTERS**: Underlying start, stop and restart failures must reach the caller
/// unmodified. Losing the chain would hide e.g. "permission denied" behind "could not start".
///
/// **BUG THIS CATCHES**: Would catch a removed `#[source]` on any wrapping variant.
#[test]
fn given_wrapped_server_error_when_inspected_then_source_chain_preserved() {
    // GIVEN: A restart error wrapping a timeout
    let err = LifecycleError::Restart {
        message: "Could not restart coordination server at 127.0.0.1:2181".to_string(),
        location: ErrorLocation::from(Location::caller()),
        source: ServerError::Timeout {
            message: "ZooKeeper did not become ready within 30s".to_string(),
            location: ErrorLocation::from(Location::caller()),
        },
    };

    // WHEN: Walking the source chain
    let source = err.source().expect("should have a source");

    // THEN: The timeout is the direct source and also exposed as a ServerError
    assert!(source.to_string().contains("did not become ready"));
    assert!(!err.is_precondition_failed());
    assert!(matches!(err.server_error(), Some(ServerError::Timeout { .. })));
}

/// **VALUE**: Verifies the aggregate error is transparent over lifecycle errors.
#[test]
fn given_lifecycle_error_when_converted_to_harness_error_then_display_unchanged() {
    // GIVEN: A lifecycle error
    let err = LifecycleError::PreconditionFailed {
        message: "instance not running (state: stopped)".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };
    let expected = err.to_string();

    // WHEN: Converting
    let harness: HarnessError = err.into();

    // THEN: Same message
    assert_eq!(harness.to_string(), expected);
    assert!(matches!(harness, HarnessError::Lifecycle(_)));
}
