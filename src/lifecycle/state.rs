//! Listener state published to `stop` and observers.

use std::fmt;

/// Listener lifecycle: `Stopped → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Stopped => "stopped",
            ListenerState::Running => "running",
            ListenerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
