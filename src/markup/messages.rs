use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// The same asset is already open; only the interaction time moved.
    AlreadyOpen,
    /// A session held across a forced teardown was picked up again.
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    RejectedLocked { remaining: Duration },
    NeedsConfirmation,
    Closed,
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Work is held and the session reopens on the next render tick.
    HeldForReopen { annotations: usize },
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LockReleased,
    Heartbeat,
    Reopened { annotations: usize },
}
