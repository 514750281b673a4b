// Unit tests for process helpers
// Integration tests for the ZooKeeper process are in integration_tests/server/testing_server.rs

use crate::LOOPBACK_HOSTNAME;
use crate::server::process::{allocate_port, probe_ready, request_termination, with_process};

use std::net::TcpListener as StdTcpListener;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn spawn_four_letter_responder(reply: &'static str) -> u16 {
    let listener = TcpListener::bind((LOOPBACK_HOSTNAME, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut command = [0u8; 4];
            let _ = stream.read_exact(&mut command).await;
            let _ = stream.write_all(reply.as_bytes()).await;
        }
    });

    port
}

/// **VALUE**: Verifies that `allocate_port()` hands out a usable, non-zero port.
///
/// **WHY THIS MATTERS**: Every instance bakes its port into `zoo.cfg` before the process starts.
/// Port 0 or a port still held by the probe listener would make ZooKeeper fail to bind.
///
/// **BUG THIS CATCHES**: Would catch if the probe listener leaks or if the OS-assigned port
/// is not read back from the socket.
#[test]
fn given_loopback_host_when_allocate_port_called_then_port_is_free_and_non_zero() {
    // GIVEN: The loopback host

    // WHEN: Allocating a port
    let port = allocate_port(LOOPBACK_HOSTNAME).expect("loopback bind should succeed");

    // THEN: The port is non-zero and can be bound again immediately
    assert_ne!(port, 0);
    assert!(
        StdTcpListener::bind((LOOPBACK_HOSTNAME, port)).is_ok(),
        "Allocated port should have been released"
    );
}

/// **VALUE**: Verifies that an unbindable host produces a typed error instead of a panic.
#[test]
fn given_unresolvable_host_when_allocate_port_called_then_returns_error() {
    // GIVEN: A host that cannot be bound
    let host = "host.invalid";

    // WHEN: Allocating a port
    let result = allocate_port(host);

    // THEN: Should return an IO error
    assert!(result.is_err(), "Binding an invalid host should fail");
}

/// **VALUE**: Verifies that `probe_ready()` accepts the `imok` reply to `ruok`.
///
/// **WHY THIS MATTERS**: `before()` only returns once this probe succeeds. If it never returns true,
/// every test would wait out the full startup timeout and then fail.
///
/// **BUG THIS CATCHES**: Would catch if the probe stops writing the command, reads before writing,
/// or compares the reply without trimming.
#[tokio::test]
async fn given_server_answering_imok_when_probed_then_returns_true() {
    // GIVEN: A listener that answers like a healthy ZooKeeper
    let port = spawn_four_letter_responder("imok").await;

    // WHEN: Probing
    let ready = probe_ready(LOOPBACK_HOSTNAME, port).await;

    // THEN: Should report ready
    assert!(ready, "imok reply should count as ready");
}

/// **VALUE**: Verifies that any reply other than `imok` is treated as not ready.
///
/// **BUG THIS CATCHES**: Would catch a probe that treats "connection accepted" as ready, which
/// would let `before()` return while ZooKeeper is still loading its database.
#[tokio::test]
async fn given_server_answering_garbage_when_probed_then_returns_false() {
    // GIVEN: A listener that answers something else
    let port = spawn_four_letter_responder("ruok is not executed").await;

    // WHEN: Probing
    let ready = probe_ready(LOOPBACK_HOSTNAME, port).await;

    // THEN: Should not report ready
    assert!(!ready);
}

/// **VALUE**: Verifies that a refused connection is reported as not ready rather than an error.
#[tokio::test]
async fn given_nothing_listening_when_probed_then_returns_false() {
    // GIVEN: A port with nothing listening
    let port = allocate_port(LOOPBACK_HOSTNAME).unwrap();

    // WHEN: Probing
    let ready = probe_ready(LOOPBACK_HOSTNAME, port).await;

    // THEN: Should not report ready
    assert!(!ready);
}

/// **VALUE**: Verifies that `with_process()` finds live processes and tolerates missing ones.
///
/// **WHY THIS MATTERS**: A ZooKeeper process can exit on its own between the lifecycle call and
/// the signal. Looking it up must not panic.
#[test]
fn given_own_and_missing_pid_when_with_process_called_then_finds_only_own() {
    // GIVEN: Our own PID and one that does not exist
    let our_pid = std::process::id();

    // WHEN: Looking both up
    let found = with_process(our_pid, |p| p.pid().as_u32());
    let missing = with_process(u32::MAX, |_| true);

    // THEN: Only our own process is found
    assert_eq!(found, Some(our_pid));
    assert!(missing.is_none());
}

/// **VALUE**: Verifies that signalling a vanished process reports "not found" instead of failing.
///
/// **BUG THIS CATCHES**: Would catch if `request_termination()` treated a missing process as a
/// delivered signal, which would make `stop()` wait for a process that is already gone.
#[test]
fn given_nonexistent_pid_when_request_termination_called_then_returns_none() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN: Requesting termination
    let result = request_termination(fake_pid);

    // THEN: Nothing was signalled
    assert!(result.is_none());
}
