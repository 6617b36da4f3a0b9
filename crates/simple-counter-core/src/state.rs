//! Connection status and lifecycle states of a polling adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status reported by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Not started yet
    #[default]
    Uninitialized,
    /// Running without a persistent connection to manage
    Stateless,
    /// Connected to the device
    Connected,
    /// Last operation failed
    Error,
    /// Stopped
    Disconnected,
}

impl ConnectionStatus {
    /// Check if the status reports a fault.
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }
}

/// Lifecycle state of an adapter instance.
///
/// `Created → Starting → Running → Stopping → Stopped`, with `Removed`
/// reachable from `Running` only when the error budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Constructed, not started
    #[default]
    Created,
    /// Start in progress, or start failed
    Starting,
    /// Accepting polls
    Running,
    /// Stop in progress
    Stopping,
    /// Stopped
    Stopped,
    /// Removed after exhausting the error budget
    Removed,
}

impl Lifecycle {
    /// Check if no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Removed)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(Lifecycle::Stopped.is_terminal());
        assert!(Lifecycle::Removed.is_terminal());
        assert!(!Lifecycle::Running.is_terminal());
        assert!(!Lifecycle::Starting.is_terminal());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&ConnectionStatus::Stateless).unwrap();
        assert_eq!(json, "\"STATELESS\"");
    }
}
