//! Idle countdown state machine.
//!
//! Owns the single reload countdown: arming supersedes any prior deadline,
//! so at most one countdown is ever live.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Inactivity window before a reload is requested.
///
/// Fixed at source time; deliberately not part of the config file.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Watchdog lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// No live countdown. Initial state, and the state after a firing until
    /// the reloaded page reports back in.
    Disarmed,
    /// A countdown is pending.
    Armed,
    /// The countdown elapsed uninterrupted. Terminal until the next signal
    /// re-arms.
    Fired,
}

/// Idle watchdog holding the single countdown deadline.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
    state: WatchdogState,
}

impl Watchdog {
    /// Create a disarmed watchdog with the given inactivity timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
            state: WatchdogState::Disarmed,
        }
    }

    /// Arm or re-arm the countdown.
    ///
    /// Supersedes any prior deadline; cancelling a countdown that has already
    /// fired or never existed is a no-op.
    pub fn arm(&mut self) {
        let deadline = Instant::now() + self.timeout;
        self.deadline = Some(deadline);
        self.state = WatchdogState::Armed;
        trace!("Watchdog armed, deadline in {:?}", self.timeout);
    }

    /// Record that the countdown elapsed uninterrupted.
    ///
    /// Clears the deadline; the watchdog stays in `Fired` until `arm` is
    /// called again.
    pub fn fire(&mut self) {
        self.deadline = None;
        self.state = WatchdogState::Fired;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Whether a countdown is pending.
    pub fn is_armed(&self) -> bool {
        self.state == WatchdogState::Armed
    }

    /// Deadline of the live countdown, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Configured inactivity timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left until the live countdown fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(IDLE_TIMEOUT)
    }
}
