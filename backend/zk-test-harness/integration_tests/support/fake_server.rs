// In-memory coordination server recording every call, with switchable failures.

use zk_test_harness::{CoordinationServer, ServerError, ServerFactory};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

const BASE_PORT: u16 = 40_000;

#[derive(Debug, Default, Clone, Copy)]
pub struct Failures {
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
    /// Restart fails after the stop half succeeded, leaving the instance down.
    pub restart_leaves_stopped: bool,
    pub close: bool,
}

#[derive(Debug, Default)]
pub struct Journal {
    pub failures: Failures,
    pub created: usize,
    pub closed: usize,
    pub events: Vec<String>,
}

impl Journal {
    /// Instances created and not yet closed.
    pub fn live(&self) -> usize {
        self.created - self.closed
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    journal: Arc<Mutex<Journal>>,
}

impl FakeFactory {
    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    pub fn fail(&self, configure: impl FnOnce(&mut Failures)) {
        configure(&mut self.journal().failures);
    }
}

fn injected(kind: &str, id: usize) -> ServerError {
    ServerError::Signal {
        message: format!("injected {kind} failure on fake #{id}"),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[async_trait]
impl ServerFactory for FakeFactory {
    type Server = FakeServer;

    async fn create_started(&self) -> Result<FakeServer, ServerError> {
        let mut journal = self.journal();
        if journal.failures.start {
            journal.events.push("create:failed".to_string());
            return Err(ServerError::Spawn {
                message: "injected start failure".to_string(),
                location: ErrorLocation::from(Location::caller()),
                source: "zkServer.sh: not found".into(),
            });
        }

        journal.created += 1;
        let id = journal.created;
        journal.events.push(format!("create:{id}"));

        Ok(FakeServer {
            id,
            port: BASE_PORT + id as u16,
            running: true,
            closed: false,
            journal: Arc::clone(&self.journal),
        })
    }
}

#[derive(Debug)]
pub struct FakeServer {
    id: usize,
    port: u16,
    running: bool,
    closed: bool,
    journal: Arc<Mutex<Journal>>,
}

impl FakeServer {
    fn record(&self, event: &str) -> Failures {
        let mut journal = self.journal.lock().unwrap();
        journal.events.push(format!("{event}:{}", self.id));
        journal.failures
    }
}

#[async_trait]
impl CoordinationServer for FakeServer {
    fn connect_string(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn start(&mut self) -> Result<(), ServerError> {
        let failures = self.record("start");
        if failures.start {
            return Err(injected("start", self.id));
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServerError> {
        let failures = self.record("stop");
        if failures.stop {
            return Err(injected("stop", self.id));
        }
        self.running = false;
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), ServerError> {
        let failures = self.record("restart");
        if failures.restart_leaves_stopped {
            self.running = false;
            return Err(injected("restart", self.id));
        }
        if failures.restart {
            return Err(injected("restart", self.id));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        let failures = self.record("close");
        if !self.closed {
            self.closed = true;
            self.running = false;
            self.journal.lock().unwrap().closed += 1;
        }
        if failures.close {
            return Err(injected("close", self.id));
        }
        Ok(())
    }
}
