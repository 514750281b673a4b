use std::mem;

/// What the manager currently holds.
///
/// `Stopped` keeps the instance so it can be resumed or closed; only
/// `Running` satisfies the "instance must be running" precondition.
#[derive(Debug)]
pub enum InstanceState<S> {
    Absent,
    Running(S),
    Stopped(S),
}

impl<S> Default for InstanceState<S> {
    fn default() -> Self {
        InstanceState::Absent
    }
}

impl<S> InstanceState<S> {
    pub fn name(&self) -> &'static str {
        match self {
            InstanceState::Absent => "absent",
            InstanceState::Running(_) => "running",
            InstanceState::Stopped(_) => "stopped",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, InstanceState::Absent)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running(_))
    }

    /// Move the held instance out, leaving `Absent` behind.
    pub(crate) fn take(&mut self) -> Option<S> {
        match mem::take(self) {
            InstanceState::Absent => None,
            InstanceState::Running(server) | InstanceState::Stopped(server) => Some(server),
        }
    }

    /// Re-tag the held instance as running or stopped. No-op when absent.
    pub(crate) fn settle(&mut self, running: bool) {
        *self = match mem::take(self) {
            InstanceState::Running(server) | InstanceState::Stopped(server) if running => {
                InstanceState::Running(server)
            }
            InstanceState::Running(server) | InstanceState::Stopped(server) => {
                InstanceState::Stopped(server)
            }
            InstanceState::Absent => InstanceState::Absent,
        };
    }
}
