use crate::config::TestingServerConfig;
use crate::error::server::ServerError;
use crate::server::process::{allocate_port, probe_ready, request_termination};
use crate::server::{CoordinationServer, ServerFactory};

use common::ErrorLocation;
use models::{InstanceInfo, InstanceInfoBuilder};

use std::fmt::Write as _;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use tempfile::{Builder as TempDirBuilder, TempDir};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;
use tokio::time::sleep as TokioSleep;
use tokio::time::timeout as TokioTimeout;

const START_FOREGROUND_COMMAND: &str = "start-foreground";
const ZOO_CFG_FILE_NAME: &str = "zoo.cfg";
const DATA_SUBDIR: &str = "data";
const LOG_SUBDIR: &str = "logs";
const TEMP_DIR_PREFIX: &str = "zk-test-";
const ZOO_LOG_DIR_ENV: &str = "ZOO_LOG_DIR";
const READY_POLL_INITIAL_INTERVAL: Duration = Duration::from_millis(50);
const READY_POLL_MAX_INTERVAL: Duration = Duration::from_millis(500);

/// Renders the `zoo.cfg` for a standalone instance.
///
/// Four-letter words are whitelisted so the readiness probe can use `ruok`;
/// the admin server is disabled so parallel instances never race for port 8080.
pub(crate) fn render_zoo_cfg(config: &TestingServerConfig, data_dir: &Path, port: u16) -> String {
    let mut cfg = String::new();
    let _ = writeln!(cfg, "tickTime={}", config.tick_time_ms);
    let _ = writeln!(cfg, "dataDir={}", data_dir.display());
    let _ = writeln!(cfg, "clientPort={port}");
    let _ = writeln!(cfg, "clientPortAddress={}", config.host);
    let _ = writeln!(cfg, "maxClientCnxns=0");
    let _ = writeln!(cfg, "admin.enableServer=false");
    let _ = writeln!(cfg, "4lw.commands.whitelist=ruok,srvr");

    for (key, value) in &config.properties {
        let _ = writeln!(cfg, "{key}={value}");
    }

    cfg
}

pub(crate) fn build_server_command(binary: &str, cfg_path: &Path, log_dir: &Path) -> TokioCommand {
    let mut cmd = TokioCommand::new(binary);
    cmd.arg(START_FOREGROUND_COMMAND)
        .arg(cfg_path)
        .env(ZOO_LOG_DIR_ENV, log_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Reads `stream` to EOF, handing each line to `on_line` with invalid UTF-8 replaced.
///
/// Returns the number of lines read. A read error ends the drain.
pub(crate) async fn drain_lines<R>(stream: R, mut on_line: impl FnMut(&str)) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => return count,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']));
                count += 1;
            }
        }
    }
}

fn forward_output<R>(stream: Option<R>, label: &'static str, port: u16)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    if let Some(stream) = stream {
        TokioSpawn(async move {
            drain_lines(stream, |line| trace!("ZooKeeper :{port} {label}: {line}")).await;
        });
    }
}

/// Readiness polling schedule: starts at 50ms, caps at 500ms, gives up after `startup_timeout`.
pub(crate) fn readiness_backoff(startup_timeout: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: READY_POLL_INITIAL_INTERVAL,
        initial_interval: READY_POLL_INITIAL_INTERVAL,
        max_interval: READY_POLL_MAX_INTERVAL,
        max_elapsed_time: Some(startup_timeout),
        ..Default::default()
    }
}

/// Poll `ruok` until the server answers, the process exits, or the timeout elapses.
async fn wait_until_ready(
    child: &mut TokioChild,
    host: &str,
    port: u16,
    startup_timeout: Duration,
) -> Result<(), ServerError> {
    let mut backoff = readiness_backoff(startup_timeout);

    debug!("Waiting for ZooKeeper at {host}:{port}");

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(ServerError::ProcessExited {
                    message: format!(
                        "ZooKeeper process exited with {status} before accepting connections on port {port}"
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Ok(None) => {}
            Err(e) => {
                return Err(ServerError::Io {
                    message: "Failed to poll ZooKeeper process status".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                });
            }
        }

        if probe_ready(host, port).await {
            return Ok(());
        }

        match backoff.next_backoff() {
            Some(duration) => {
                trace!("ZooKeeper not ready, retrying after {duration:?}");
                TokioSleep(duration).await;
            }
            None => {
                return Err(ServerError::Timeout {
                    message: format!(
                        "ZooKeeper at {host}:{port} did not become ready within {startup_timeout:?}"
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }
}

/// A standalone ZooKeeper server process with its own temporary data directory.
///
/// The port and data directory are fixed when the instance is created, so the
/// connect string stays the same across `stop`/`start`/`restart`. Dropping a
/// running instance kills the process and removes the directory.
#[derive(Debug)]
pub struct ZooKeeperTestingServer {
    config: TestingServerConfig,
    port: u16,
    workspace: Option<TempDir>,
    child: Option<TokioChild>,
}

impl ZooKeeperTestingServer {
    /// Prepare an instance without starting it.
    ///
    /// Allocates the port (unless one is configured), creates the data
    /// directory and writes `zoo.cfg`.
    #[track_caller]
    pub fn new(config: TestingServerConfig) -> Result<Self, ServerError> {
        let port = match config.port {
            0 => allocate_port(&config.host)?,
            fixed => fixed,
        };

        let workspace = TempDirBuilder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(|e| ServerError::Io {
                message: "Failed to create temporary directory".to_string(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        let data_dir = workspace.path().join(DATA_SUBDIR);
        let log_dir = workspace.path().join(LOG_SUBDIR);
        for dir in [&data_dir, &log_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ServerError::Io {
                message: format!("Failed to create {}", dir.display()),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;
        }

        let cfg_path = workspace.path().join(ZOO_CFG_FILE_NAME);
        std::fs::write(&cfg_path, render_zoo_cfg(&config, &data_dir, port)).map_err(|e| {
            ServerError::Io {
                message: format!("Failed to write {}", cfg_path.display()),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            }
        })?;

        debug!(
            "Prepared ZooKeeper instance on {}:{port} in {}",
            config.host,
            workspace.path().display()
        );

        Ok(Self {
            config,
            port,
            workspace: Some(workspace),
            child: None,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Root of the instance's temporary directory, `None` once closed.
    pub fn workspace_dir(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempDir::path)
    }

    pub fn is_closed(&self) -> bool {
        self.workspace.is_none()
    }

    /// Snapshot of the running process, `None` when stopped or closed.
    pub fn info(&self) -> Result<Option<InstanceInfo>, ServerError> {
        let (Some(child), Some(workspace)) = (self.child.as_ref(), self.workspace.as_ref()) else {
            return Ok(None);
        };

        let Some(pid) = child.id() else {
            return Ok(None);
        };

        let info = InstanceInfoBuilder::default()
            .with_pid(pid)
            .with_host(self.config.host.clone())
            .with_port(self.port)
            .with_data_dir(workspace.path().join(DATA_SUBDIR))
            .build()?;

        Ok(Some(info))
    }

    fn paths(&self) -> Result<(PathBuf, PathBuf), ServerError> {
        let workspace = self.workspace.as_ref().ok_or_else(|| ServerError::Closed {
            message: format!("ZooKeeper instance on port {} has been closed", self.port),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok((
            workspace.path().join(ZOO_CFG_FILE_NAME),
            workspace.path().join(LOG_SUBDIR),
        ))
    }
}

#[async_trait]
impl CoordinationServer for ZooKeeperTestingServer {
    fn connect_string(&self) -> String {
        format!("{}:{}", self.config.host, self.port)
    }

    fn is_running(&self) -> bool {
        self.child.is_some()
    }

    async fn start(&mut self) -> Result<(), ServerError> {
        let (cfg_path, log_dir) = self.paths()?;

        if self.child.is_some() {
            debug!("ZooKeeper on port {} already running", self.port);
            return Ok(());
        }

        info!(
            "Starting ZooKeeper via {} on port {}",
            self.config.binary, self.port
        );

        let mut child = build_server_command(&self.config.binary, &cfg_path, &log_dir)
            .spawn()
            .map_err(|e| ServerError::Spawn {
                message: format!("Failed to spawn {}: {e}", self.config.binary),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })?;

        forward_output(child.stdout.take(), "stdout", self.port);
        forward_output(child.stderr.take(), "stderr", self.port);

        let ready = wait_until_ready(
            &mut child,
            &self.config.host,
            self.port,
            self.config.startup_timeout,
        )
        .await;

        if let Err(e) = ready {
            warn!(
                "ZooKeeper failed to start, killing spawned process (PID: {:?})",
                child.id()
            );
            let _ = child.kill().await;
            return Err(e);
        }

        info!(
            "ZooKeeper ready at {} (PID: {})",
            self.connect_string(),
            child.id().unwrap_or_default()
        );

        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServerError> {
        let Some(mut child) = self.child.take() else {
            debug!("ZooKeeper on port {} is not running", self.port);
            return Ok(());
        };

        let pid = child.id();
        let signalled = pid.and_then(request_termination).unwrap_or(false);

        if signalled {
            match TokioTimeout(self.config.shutdown_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    info!("ZooKeeper on port {} stopped ({status})", self.port);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    return Err(ServerError::Io {
                        message: format!("Failed to wait for ZooKeeper PID {pid:?}"),
                        location: ErrorLocation::from(Location::caller()),
                        source: e,
                    });
                }
                Err(_) => {
                    warn!(
                        "ZooKeeper PID {pid:?} still running after {:?}, killing",
                        self.config.shutdown_timeout
                    );
                }
            }
        }

        child.kill().await.map_err(|e| ServerError::Signal {
            message: format!("Failed to kill ZooKeeper PID {pid:?}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("ZooKeeper on port {} killed", self.port);
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), ServerError> {
        self.paths()?;

        info!("Restarting ZooKeeper on port {}", self.port);
        self.stop().await?;
        self.start().await
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        if self.is_closed() {
            debug!("ZooKeeper on port {} already closed", self.port);
            return Ok(());
        }

        let stopped = self.stop().await;

        let removed = match self.workspace.take() {
            Some(workspace) => {
                let path = workspace.path().to_path_buf();
                workspace.close().map_err(|e| ServerError::Io {
                    message: format!("Failed to remove {}", path.display()),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                })
            }
            None => Ok(()),
        };

        debug!("ZooKeeper on port {} closed", self.port);
        stopped.and(removed)
    }
}

impl Drop for ZooKeeperTestingServer {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            warn!(
                "ZooKeeper on port {} dropped while running, killing PID {:?}",
                self.port,
                child.id()
            );
            let _ = child.start_kill();
        }
    }
}

/// Creates a fresh [`ZooKeeperTestingServer`] per call, each with its own port
/// and data directory.
#[derive(Debug, Clone, Default)]
pub struct ZooKeeperServerFactory {
    config: TestingServerConfig,
}

impl ZooKeeperServerFactory {
    pub fn new(config: TestingServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TestingServerConfig {
        &self.config
    }
}

#[async_trait]
impl ServerFactory for ZooKeeperServerFactory {
    type Server = ZooKeeperTestingServer;

    async fn create_started(&self) -> Result<ZooKeeperTestingServer, ServerError> {
        let mut server = ZooKeeperTestingServer::new(self.config.clone())?;
        server.start().await?;
        Ok(server)
    }
}
