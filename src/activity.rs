//! Activity signal sources.
//!
//! This module provides a generic abstraction for receiving user-interaction
//! signals from whatever reports them for the kiosk session.

mod socket;

use async_trait::async_trait;
pub use socket::SocketSource;
use thiserror::Error;

/// Signal categories reported by the kiosk session.
///
/// The four interaction kinds are behaviorally identical: any of them resets
/// the idle countdown. They are kept distinct for parsing and logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// The displayed page finished loading.
    PageLoad,
    /// Pointer movement.
    MouseMove,
    /// Key press.
    KeyPress,
    /// Touch start.
    TouchStart,
    /// Pointer click.
    Click,
}

impl SignalKind {
    /// Wire name of the signal, as emitted on the activity socket.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PageLoad => "load",
            Self::MouseMove => "mousemove",
            Self::KeyPress => "keypress",
            Self::TouchStart => "touchstart",
            Self::Click => "click",
        }
    }

    /// True for the four user-interaction kinds, false for page lifecycle.
    pub fn is_interaction(self) -> bool {
        !matches!(self, Self::PageLoad)
    }
}

/// Source-agnostic activity event.
///
/// Signals carry no payload the daemon inspects; the kind is the whole event.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    /// Which signal was reported.
    pub kind: SignalKind,
}

impl ActivityEvent {
    /// Create a new activity event.
    pub fn new(kind: SignalKind) -> Self {
        Self { kind }
    }
}

/// Trait for activity signal sources.
#[async_trait]
pub trait ActivitySource: Send {
    /// Get the next activity signal.
    ///
    /// This method blocks until a signal occurs or an error happens.
    /// Implementations should handle reconnection internally.
    async fn next_event(&mut self) -> Result<ActivityEvent, ActivityError>;
}

/// Errors that can occur while receiving activity signals.
#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Socket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Socket path not found: {0}")]
    SocketNotFound(String),
}
