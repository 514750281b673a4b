use crate::error::server::ServerError;

use common::ErrorLocation;

use std::net::TcpListener;
use std::panic::Location;
use std::time::Duration;

use log::{debug, trace};
use sysinfo::{Pid, Process, ProcessesToUpdate, Signal, System};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout as TokioTimeout;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const READY_COMMAND: &[u8] = b"ruok";
const READY_RESPONSE: &str = "imok";

/// Reserve a free TCP port on `host` by binding port 0 and releasing it.
///
/// The port is only guaranteed free at the time of the call.
#[track_caller]
pub fn allocate_port(host: &str) -> Result<u16, ServerError> {
    let listener = TcpListener::bind((host, 0)).map_err(|e| ServerError::Io {
        message: format!("Failed to bind {host}:0 to allocate a port"),
        location: ErrorLocation::from(Location::caller()),
        source: e,
    })?;

    let port = listener
        .local_addr()
        .map_err(|e| ServerError::Io {
            message: format!("Failed to read local address of listener on {host}"),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?
        .port();

    trace!("Allocated port {port} on {host}");
    Ok(port)
}

/// Ask a ZooKeeper server whether it is serving, using the `ruok` four-letter word.
///
/// # Returns
///
/// * `true` - The server answered `imok`
/// * `false` - Connection refused, timed out, or any other reply
pub async fn probe_ready(host: &str, port: u16) -> bool {
    let exchange = async {
        let mut stream = TcpStream::connect((host, port)).await?;
        stream.write_all(READY_COMMAND).await?;
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        Ok::<_, std::io::Error>(reply)
    };

    match TokioTimeout(PROBE_TIMEOUT, exchange).await {
        Ok(Ok(reply)) if reply.trim() == READY_RESPONSE => {
            debug!("Readiness probe succeeded for {host}:{port}");
            true
        }
        Ok(Ok(reply)) => {
            trace!("Readiness probe for {host}:{port} got unexpected reply: {reply:?}");
            false
        }
        Ok(Err(e)) => {
            trace!("Readiness probe for {host}:{port} failed: {e}");
            false
        }
        Err(_) => {
            trace!("Readiness probe for {host}:{port} timed out after {PROBE_TIMEOUT:?}");
            false
        }
    }
}

pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let mut sys = System::new();
    let target = Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

    sys.process(target).map(f)
}

/// Send SIGTERM to `pid`.
///
/// # Returns
///
/// * `Some(true)` - Signal delivered
/// * `Some(false)` - Process found but the signal could not be sent
/// * `None` - Process not found, or graceful termination is unsupported on this platform
pub fn request_termination(pid: u32) -> Option<bool> {
    with_process(pid, |p| p.kill_with(Signal::Term))
        .flatten()
        .inspect(|sent| debug!("Sent SIGTERM to PID {pid}: success={sent}"))
}
