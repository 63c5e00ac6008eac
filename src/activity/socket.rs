//! Unix socket activity backend.
//!
//! Connects to the kiosk shell's activity socket and parses newline-delimited
//! signal lines into activity events.

use super::{ActivityError, ActivityEvent, ActivitySource, SignalKind};
use async_trait::async_trait;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info, trace, warn};

/// Socket name under `$XDG_RUNTIME_DIR` when no path is configured.
const DEFAULT_SOCKET: &str = "idle-reloadd/activity.sock";

/// Activity source reading signal lines from a Unix socket.
///
/// The socket is provided by whatever reports interaction for the kiosk
/// session (a browser-side shim or the session wrapper); one signal per line,
/// wire names `load`, `mousemove`, `keypress`, `touchstart`, `click`.
/// Anything after the signal token is ignored.
pub struct SocketSource {
    reader: Option<BufReader<UnixStream>>,
    path_override: Option<PathBuf>,
    backoff: Duration,
}

impl SocketSource {
    /// Connect to the activity socket.
    ///
    /// Uses `path_override` when set, otherwise the default path under
    /// `$XDG_RUNTIME_DIR`.
    pub async fn connect(path_override: Option<PathBuf>) -> Result<Self, ActivityError> {
        let socket_path = resolve_socket_path(path_override.as_deref())?;
        info!("Connecting to activity socket: {}", socket_path.display());

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| ActivityError::ConnectionFailed(e.to_string()))?;

        info!("Connected to activity socket");

        Ok(Self {
            reader: Some(BufReader::new(stream)),
            path_override,
            backoff: Duration::from_millis(250),
        })
    }

    /// Get diagnostic information about the activity socket environment.
    pub fn get_diagnostics() -> Vec<String> {
        let mut diags = Vec::new();

        match env::var("XDG_RUNTIME_DIR") {
            Ok(v) => diags.push(format!("XDG_RUNTIME_DIR={}", v)),
            Err(_) => diags.push("XDG_RUNTIME_DIR: NOT SET".to_string()),
        }

        if let Ok(path) = resolve_socket_path(None) {
            diags.push(format!("Activity socket: {} (exists)", path.display()));
        } else {
            diags.push("Activity socket: NOT FOUND".to_string());
        }

        diags
    }

    /// Attempt to reconnect to the activity socket.
    async fn reconnect(&mut self) -> Result<(), ActivityError> {
        const MAX_BACKOFF: Duration = Duration::from_secs(5);

        warn!(
            "Activity socket connection lost. Retrying in {:?}...",
            self.backoff
        );

        tokio::time::sleep(self.backoff).await;

        // Exponential backoff with cap
        self.backoff = std::cmp::min(self.backoff * 2, MAX_BACKOFF);

        let socket_path = resolve_socket_path(self.path_override.as_deref())?;
        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| ActivityError::ConnectionFailed(e.to_string()))?;

        info!("Reconnected to activity socket");
        self.reader = Some(BufReader::new(stream));
        self.backoff = Duration::from_millis(250); // Reset backoff on success

        Ok(())
    }
}

#[async_trait]
impl ActivitySource for SocketSource {
    async fn next_event(&mut self) -> Result<ActivityEvent, ActivityError> {
        loop {
            let reader = match &mut self.reader {
                Some(r) => r,
                None => {
                    self.reconnect().await?;
                    continue;
                }
            };

            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    // EOF - emitter went away
                    warn!("Activity stream ended (EOF)");
                    self.reader = None;
                    self.reconnect().await?;
                    continue;
                }
                Ok(_) => {
                    trace!("Received line: {}", line.trim());
                    if let Some(kind) = parse_signal_line(&line) {
                        return Ok(ActivityEvent::new(kind));
                    }
                    // Unknown signal, read next line
                }
                Err(e) => {
                    warn!("Read error: {}", e);
                    self.reader = None;
                    self.reconnect().await?;
                    continue;
                }
            }
        }
    }
}

/// Resolve the activity socket path.
fn resolve_socket_path(path_override: Option<&Path>) -> Result<PathBuf, ActivityError> {
    if let Some(path) = path_override {
        if !path.exists() {
            return Err(ActivityError::SocketNotFound(
                path.display().to_string(),
            ));
        }
        return Ok(path.to_path_buf());
    }

    let xdg_runtime_dir = env::var("XDG_RUNTIME_DIR")
        .map_err(|_| ActivityError::EnvVarNotSet("XDG_RUNTIME_DIR".to_string()))?;

    let socket_path = PathBuf::from(&xdg_runtime_dir).join(DEFAULT_SOCKET);

    if !socket_path.exists() {
        return Err(ActivityError::SocketNotFound(
            socket_path.display().to_string(),
        ));
    }

    Ok(socket_path)
}

/// Parse a single line from the activity stream.
///
/// Format: SIGNAL[ PAYLOAD]\n - the payload is never inspected.
/// Unknown signals are ignored.
fn parse_signal_line(line: &str) -> Option<SignalKind> {
    let token = line.split_whitespace().next()?;

    match token {
        "load" => Some(SignalKind::PageLoad),
        "mousemove" => Some(SignalKind::MouseMove),
        "keypress" => Some(SignalKind::KeyPress),
        "touchstart" => Some(SignalKind::TouchStart),
        "click" => Some(SignalKind::Click),
        _ => {
            debug!("Ignoring unknown signal: {}", token);
            None
        }
    }
}
