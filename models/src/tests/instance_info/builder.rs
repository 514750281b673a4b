use crate::{InstanceInfoBuilder, ModelError};

use std::path::PathBuf;

fn complete_builder() -> InstanceInfoBuilder {
    InstanceInfoBuilder::default()
        .with_pid(4242)
        .with_host("127.0.0.1")
        .with_port(2181)
        .with_data_dir("/tmp/zk-test-data")
}

fn validation_message(builder: InstanceInfoBuilder) -> String {
    match builder.build() {
        Err(ModelError::Validation { message, .. }) => message,
        Ok(info) => panic!("Expected validation error, got {info:?}"),
    }
}

/// **VALUE**: Verifies that a complete builder produces an InstanceInfo with a derived connect string.
///
/// **WHY THIS MATTERS**: Test code connects using `connect_string`. If it were assembled separately
/// from host and port it could drift, and clients would dial the wrong instance.
///
/// **BUG THIS CATCHES**: Would catch a connect string built with the wrong separator or swapped parts.
#[test]
fn given_all_fields_when_building_then_connect_string_is_host_colon_port() {
    // GIVEN: A builder with every field set
    let builder = complete_builder();

    // WHEN: Building
    let info = builder.build().expect("complete builder should succeed");

    // THEN: Fields are copied and the connect string is derived
    assert_eq!(info.pid, 4242);
    assert_eq!(info.host, "127.0.0.1");
    assert_eq!(info.port, 2181);
    assert_eq!(info.connect_string, "127.0.0.1:2181");
    assert_eq!(info.data_dir, PathBuf::from("/tmp/zk-test-data"));
}

/// **VALUE**: Verifies that builder validation rejects zero PIDs.
///
/// **WHY THIS MATTERS**: PID 0 is never a spawned server. Accepting it would let a half-spawned
/// instance masquerade as running.
///
/// **BUG THIS CATCHES**: Would catch if the non-zero PID check is deleted during refactoring.
#[test]
fn given_zero_pid_when_building_then_returns_validation_error() {
    // GIVEN: Builder with PID set to zero
    let builder = complete_builder().with_pid(0);

    // WHEN / THEN: Validation fails with a clear message
    assert_eq!(validation_message(builder), "PID must be non-zero");
}

/// **VALUE**: Verifies that required fields are enforced.
///
/// **BUG THIS CATCHES**: Would catch if a required field silently defaults instead of failing.
#[test]
fn given_missing_fields_when_building_then_each_reports_its_own_message() {
    // GIVEN: Builders each missing one required field
    let cases = vec![
        (
            InstanceInfoBuilder::default()
                .with_host("127.0.0.1")
                .with_port(2181)
                .with_data_dir("/tmp/zk"),
            "PID is required",
        ),
        (
            InstanceInfoBuilder::default()
                .with_pid(1)
                .with_port(2181)
                .with_data_dir("/tmp/zk"),
            "Host is required",
        ),
        (
            InstanceInfoBuilder::default()
                .with_pid(1)
                .with_host("127.0.0.1")
                .with_data_dir("/tmp/zk"),
            "Port is required",
        ),
        (
            InstanceInfoBuilder::default()
                .with_pid(1)
                .with_host("127.0.0.1")
                .with_port(2181),
            "Data directory is required",
        ),
    ];

    // WHEN / THEN: Each build fails with the matching message
    for (builder, expected) in cases {
        assert_eq!(validation_message(builder), expected);
    }
}

/// **VALUE**: Verifies that hosts which would corrupt the `host:port` form are rejected.
///
/// **WHY THIS MATTERS**: A host containing `:` produces a connect string clients cannot parse.
///
/// **BUG THIS CATCHES**: Would catch if host validation is loosened to accept anything non-empty.
#[test]
fn given_malformed_host_when_building_then_returns_validation_error() {
    // GIVEN: Hosts that are empty, contain whitespace, or already carry a port
    for host in ["", "local host", "127.0.0.1:2181"] {
        // WHEN: Building with that host
        let message = validation_message(complete_builder().with_host(host));

        // THEN: Should reject it
        assert!(
            message.starts_with("Invalid host"),
            "Unexpected message for '{host}': {message}"
        );
    }
}

/// **VALUE**: Verifies that port zero (the "pick any port" sentinel) never reaches a running instance.
#[test]
fn given_zero_port_when_building_then_returns_validation_error() {
    // GIVEN: Builder with port zero
    let builder = complete_builder().with_port(0);

    // WHEN / THEN
    assert_eq!(validation_message(builder), "Port must be non-zero");
}
