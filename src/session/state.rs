//! Session lifecycle states.

use std::fmt;

/// Where a [`DeviceSession`](super::DeviceSession) is in its lifecycle.
///
/// `Unconnected → Connecting → (ReadyWaitTimedOut | Ready) → Active → Closed`.
/// `Connecting` moves to `Failed` only when every connection attempt fails.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, port not opened yet
    Unconnected,
    /// Opening the port
    Connecting,
    /// Port open, ready literal seen
    Ready,
    /// Port open, ready literal never arrived; continuing anyway
    ReadyWaitTimedOut,
    /// Reset done, accepting actions
    Active,
    /// Connection retries exhausted
    Failed,
    /// Port released
    Closed,
}

impl SessionState {
    /// Whether the port is expected to be held in this state.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::ReadyWaitTimedOut | SessionState::Active
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::ReadyWaitTimedOut => "ready-wait-timed-out",
            SessionState::Active => "active",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
