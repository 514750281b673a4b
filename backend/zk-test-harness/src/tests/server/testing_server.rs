// Unit tests for private helpers of the ZooKeeper testing server
// Spawn-dependent tests live in integration_tests/server/testing_server.rs

use crate::config::TestingServerConfig;
use crate::error::server::ServerError;
use crate::server::CoordinationServer;
use crate::server::process::allocate_port;
use crate::server::testing_server::{
    ZooKeeperTestingServer, build_server_command, drain_lines, readiness_backoff, render_zoo_cfg,
};

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use backoff::backoff::Backoff;

fn config_with_free_port() -> TestingServerConfig {
    TestingServerConfig {
        port: allocate_port("127.0.0.1").unwrap(),
        ..TestingServerConfig::default()
    }
}

/// **VALUE**: Verifies the generated `zoo.cfg` pins port, address and data directory.
///
/// **WHY THIS MATTERS**: The connect string handed to tests is derived from the harness's own
/// port and host. If `zoo.cfg` disagrees, clients dial a port nobody listens on.
///
/// **BUG THIS CATCHES**: Would catch a missing `clientPort`, a dropped four-letter-word whitelist
/// (the readiness probe would then never succeed), or extra properties not being written.
#[test]
fn given_config_when_rendering_zoo_cfg_then_contains_managed_and_extra_entries() {
    // GIVEN: A config with an extra property
    let mut config = TestingServerConfig::default();
    config
        .properties
        .insert("minSessionTimeout".to_string(), "4000".to_string());

    // WHEN: Rendering for a known directory and port
    let cfg = render_zoo_cfg(&config, Path::new("/tmp/zk/data"), 21810);

    // THEN: Every managed line is present, followed by the extra property
    let lines: Vec<&str> = cfg.lines().collect();
    assert!(lines.contains(&"tickTime=2000"));
    assert!(lines.contains(&"dataDir=/tmp/zk/data"));
    assert!(lines.contains(&"clientPort=21810"));
    assert!(lines.contains(&"clientPortAddress=127.0.0.1"));
    assert!(lines.contains(&"admin.enableServer=false"));
    assert!(lines.iter().any(|l| l.starts_with("4lw.commands.whitelist=") && l.contains("ruok")));
    assert_eq!(lines.last(), Some(&"minSessionTimeout=4000"));
}

/// **VALUE**: Verifies the launcher is invoked as `<binary> start-foreground <zoo.cfg>`.
///
/// **WHY THIS MATTERS**: `start` (without `-foreground`) daemonizes, so the harness would lose
/// the PID and could never stop the server.
///
/// **BUG THIS CATCHES**: Would catch a wrong sub-command, a missing config argument, or the log
/// directory no longer being redirected into the instance's temp directory.
#[test]
fn given_binary_and_paths_when_building_command_then_runs_in_foreground() {
    // GIVEN: A binary and instance paths
    let cfg_path = Path::new("/tmp/zk/zoo.cfg");
    let log_dir = Path::new("/tmp/zk/logs");

    // WHEN: Building the command
    let cmd = build_server_command("zkServer.sh", cfg_path, log_dir);

    // THEN: Program, arguments and log dir are set
    let std_cmd = cmd.as_std();
    assert_eq!(std_cmd.get_program(), "zkServer.sh");
    let args: Vec<&OsStr> = std_cmd.get_args().collect();
    assert_eq!(args, vec![OsStr::new("start-foreground"), cfg_path.as_os_str()]);
    let log_env = std_cmd
        .get_envs()
        .find(|(key, _)| *key == OsStr::new("ZOO_LOG_DIR"))
        .and_then(|(_, value)| value);
    assert_eq!(log_env, Some(log_dir.as_os_str()));
}

/// **VALUE**: Verifies that creating an instance prepares its directory without starting anything.
///
/// **WHY THIS MATTERS**: The fresh-instance guarantee relies on each instance owning a private
/// data directory. A shared directory would leak znodes from one test into the next.
#[test]
fn given_fixed_port_when_creating_instance_then_prepares_workspace_and_is_not_running() {
    // GIVEN: A config with a fixed free port
    let config = config_with_free_port();
    let port = config.port;

    // WHEN: Creating the instance
    let server = ZooKeeperTestingServer::new(config).expect("instance should be prepared");

    // THEN: Workspace exists with zoo.cfg, nothing runs yet
    let workspace = server.workspace_dir().expect("workspace should exist");
    assert!(workspace.join("zoo.cfg").is_file());
    assert!(workspace.join("data").is_dir());
    assert_eq!(server.port(), port);
    assert_eq!(server.connect_string(), format!("127.0.0.1:{port}"));
    assert!(!server.is_running());
    assert!(server.info().unwrap().is_none());
}

/// **VALUE**: Verifies that two auto-port instances never share a data directory.
#[test]
fn given_auto_port_when_creating_two_instances_then_workspaces_differ() {
    // GIVEN / WHEN: Two instances from the default config
    let first = ZooKeeperTestingServer::new(TestingServerConfig::default()).unwrap();
    let second = ZooKeeperTestingServer::new(TestingServerConfig::default()).unwrap();

    // THEN: Separate directories, non-zero ports
    assert_ne!(first.workspace_dir(), second.workspace_dir());
    assert_ne!(first.port(), 0);
    assert_ne!(second.port(), 0);
}

/// **VALUE**: Verifies that `close()` removes the workspace and is idempotent.
///
/// **WHY THIS MATTERS**: `after()` may close an instance that a failing test already closed
/// indirectly. A second close must not error, or teardown would log spurious warnings.
///
/// **BUG THIS CATCHES**: Would catch if `close()` forgets to delete the temp directory, or if it
/// errors when called on an already-closed instance.
#[tokio::test]
async fn given_prepared_instance_when_closed_twice_then_workspace_removed_and_second_close_ok() {
    // GIVEN: A prepared, never started instance
    let mut server = ZooKeeperTestingServer::new(config_with_free_port()).unwrap();
    let workspace = server.workspace_dir().unwrap().to_path_buf();

    // WHEN: Closing twice
    let first = server.close().await;
    let second = server.close().await;

    // THEN: Both succeed and the directory is gone
    assert!(first.is_ok(), "First close failed: {first:?}");
    assert!(second.is_ok(), "Second close failed: {second:?}");
    assert!(server.is_closed());
    assert!(!workspace.exists(), "Workspace should be removed");
}

/// **VALUE**: Verifies that a closed instance refuses to start or restart.
///
/// **BUG THIS CATCHES**: Would catch a close that leaves the instance resumable, which would
/// spawn ZooKeeper against a deleted data directory.
#[tokio::test]
async fn given_closed_instance_when_started_or_restarted_then_returns_closed_error() {
    // GIVEN: A closed instance
    let mut server = ZooKeeperTestingServer::new(config_with_free_port()).unwrap();
    server.close().await.unwrap();

    // WHEN: Starting and restarting
    let started = server.start().await;
    let restarted = server.restart().await;

    // THEN: Both report the instance is closed
    assert!(matches!(started, Err(ServerError::Closed { .. })));
    assert!(matches!(restarted, Err(ServerError::Closed { .. })));
}

/// **VALUE**: Verifies that stopping a never-started instance is a harmless no-op.
#[tokio::test]
async fn given_unstarted_instance_when_stopped_then_returns_ok() {
    // GIVEN: A prepared instance
    let mut server = ZooKeeperTestingServer::new(config_with_free_port()).unwrap();

    // WHEN: Stopping
    let result = server.stop().await;

    // THEN: No error, still not running
    assert!(result.is_ok());
    assert!(!server.is_running());
}

/// **VALUE**: Verifies that a missing launcher surfaces as `ServerError::Spawn`.
///
/// **WHY THIS MATTERS**: The most common CI failure is ZooKeeper not being installed. The error
/// must name the binary rather than time out after the full startup window.
#[tokio::test]
async fn given_missing_binary_when_started_then_returns_spawn_error() {
    // GIVEN: A config pointing at a binary that does not exist
    let config = TestingServerConfig {
        binary: "/nonexistent/bin/zkServer.sh".to_string(),
        ..config_with_free_port()
    };
    let mut server = ZooKeeperTestingServer::new(config).unwrap();

    // WHEN: Starting
    let result = server.start().await;

    // THEN: Spawn error naming the binary, instance not running
    match result {
        Err(ServerError::Spawn { message, .. }) => {
            assert!(message.contains("/nonexistent/bin/zkServer.sh"));
        }
        other => panic!("Expected spawn error, got {other:?}"),
    }
    assert!(!server.is_running());
}

/// **VALUE**: Verifies that a launcher exiting before readiness is reported as `ProcessExited`.
///
/// **WHY THIS MATTERS**: A broken ZooKeeper install (bad JAVA_HOME, unreadable config) exits
/// immediately. Detecting the exit avoids waiting out the startup timeout.
#[cfg(unix)]
#[tokio::test]
async fn given_binary_exiting_immediately_when_started_then_returns_process_exited() {
    // GIVEN: `true` stands in for a launcher that exits right away
    let config = TestingServerConfig {
        binary: "true".to_string(),
        ..config_with_free_port()
    };
    let mut server = ZooKeeperTestingServer::new(config).unwrap();

    // WHEN: Starting
    let result = server.start().await;

    // THEN: Reported as an early exit, nothing retained
    assert!(
        matches!(result, Err(ServerError::ProcessExited { .. })),
        "Unexpected result: {result:?}"
    );
    assert!(!server.is_running());
}

/// **VALUE**: Verifies the four-letter-word whitelist is exactly what the harness needs.
///
/// **BUG THIS CATCHES**: Would catch extra commands (e.g. `stat`) creeping into the whitelist, or
/// `ruok` being dropped so readiness can never be observed.
#[test]
fn given_default_config_when_rendering_zoo_cfg_then_whitelists_only_ruok_and_srvr() {
    // GIVEN: Default config
    let config = TestingServerConfig::default();

    // WHEN: Rendering
    let cfg = render_zoo_cfg(&config, Path::new("/tmp/zk/data"), 21810);

    // THEN: Exactly ruok and srvr
    let whitelist: Vec<&str> = cfg
        .lines()
        .filter(|l| l.starts_with("4lw.commands.whitelist="))
        .collect();
    assert_eq!(whitelist, vec!["4lw.commands.whitelist=ruok,srvr"]);
}

/// **VALUE**: Verifies the first readiness poll happens quickly rather than after the backoff
/// crate's 500ms default.
///
/// **WHY THIS MATTERS**: Every test pays the first poll interval on startup. A fast local
/// ZooKeeper is usually ready well before 500ms.
///
/// **BUG THIS CATCHES**: Would catch setting only `initial_interval`, which `next_backoff()`
/// ignores until the backoff is reset.
#[test]
fn given_readiness_backoff_when_first_polled_then_interval_is_short() {
    // GIVEN: The readiness schedule
    let mut backoff = readiness_backoff(Duration::from_secs(30));

    // WHEN: Asking for the first delay
    let first = backoff.next_backoff().expect("schedule should not be exhausted");

    // THEN: Around 50ms (randomized), well under the 500ms default
    assert!(first < Duration::from_millis(100), "first backoff was {first:?}");
}

/// **VALUE**: Verifies server output keeps being drained past a line that is not valid UTF-8.
///
/// **WHY THIS MATTERS**: If the reader stops early, the pipe fills up and ZooKeeper blocks on its
/// console appender, hanging startup.
///
/// **BUG THIS CATCHES**: Would catch a line reader that treats invalid UTF-8 as end of stream.
#[tokio::test]
async fn given_output_with_invalid_utf8_when_draining_then_reads_every_line() {
    // GIVEN: Three lines, the middle one not valid UTF-8
    let output: &[u8] = b"starting\n\xff\xfe broken\r\nbinding to port\n";
    let mut seen = Vec::new();

    // WHEN: Draining
    let count = drain_lines(output, |line| seen.push(line.to_string())).await;

    // THEN: All three lines arrive, the broken one lossily decoded
    assert_eq!(count, 3);
    assert_eq!(seen[0], "starting");
    assert!(seen[1].ends_with(" broken"));
    assert!(seen[1].contains('\u{FFFD}'));
    assert_eq!(seen[2], "binding to port");
}
