use zk_test_harness::ServerError;

use common::ErrorLocation;
use models::{InstanceInfoBuilder, ModelError};

use std::error::Error;
use std::io::Error as IoError;
use std::io::ErrorKind;
use std::panic::Location;

/// **VALUE**: Verifies spawn errors keep the OS error as their source.
///
/// **WHY THIS MATTERS**: "not found" versus "permission denied" decides whether ZooKeeper is
/// missing or merely not executable. That detail lives in the source error.
#[test]
fn given_spawn_error_with_io_source_when_inspected_then_preserves_chain() {
    // GIVEN: A spawn error wrapping an IO error
    let err = ServerError::Spawn {
        message: "Failed to spawn zkServer.sh".to_string(),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(IoError::new(ErrorKind::PermissionDenied, "permission denied")),
    };

    // WHEN: Inspecting
    let rendered = err.to_string();
    let source = err.source().expect("should have a source");

    // THEN: Message and cause both available
    assert!(rendered.contains("Spawn Error: Failed to spawn zkServer.sh"));
    assert!(rendered.contains("server.rs"));
    assert!(source.to_string().contains("permission denied"));
}

/// **VALUE**: Verifies model validation failures convert into server validation errors.
///
/// **BUG THIS CATCHES**: Would catch a conversion that drops the original message or location.
#[test]
fn given_model_validation_error_when_converted_then_message_and_location_kept() {
    // GIVEN: An invalid instance snapshot
    let model_err = InstanceInfoBuilder::default().build().unwrap_err();
    let ModelError::Validation { message, location } = &model_err;
    let (message, location) = (message.clone(), *location);

    // WHEN: Converting
    let err = ServerError::from(model_err);

    // THEN: Same message and location
    match err {
        ServerError::Validation {
            message: converted,
            location: converted_location,
        } => {
            assert_eq!(converted, message);
            assert_eq!(converted_location, location);
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}
