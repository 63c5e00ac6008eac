//! Page reload effect.
//!
//! Builds and spawns the configured reload command when the idle watchdog
//! fires.

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, trace};

/// Trait for the reload effect.
#[async_trait]
pub trait Reloader: Send {
    /// Request a full reload of the displayed page.
    ///
    /// Fire-and-forget from the caller's perspective: the worst-case outcome
    /// of a failure is that the page does not reload.
    async fn reload(&mut self) -> Result<()>;
}

/// Reload client that spawns the configured command.
#[derive(Debug)]
pub struct ReloadClient {
    /// Resolved path to the reload program.
    program: PathBuf,

    /// Arguments passed to the program.
    args: Vec<String>,

    /// Dry run mode.
    dry_run: bool,

    /// Last successful reload time (for health checks).
    last_reload: Option<Instant>,

    /// Count of consecutive failures.
    consecutive_failures: u32,
}

impl ReloadClient {
    /// Create a new reload client from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some((program, args)) = config.reload_command.split_first() else {
            anyhow::bail!("reload_command is empty");
        };

        let program = resolve_program(Path::new(program))?;
        info!(
            "Using reload command: {} {}",
            program.display(),
            args.join(" ")
        );

        Ok(Self {
            program,
            args: args.to_vec(),
            dry_run: config.dry_run,
            last_reload: None,
            consecutive_failures: 0,
        })
    }

    /// Get time since the last successful reload.
    #[allow(dead_code)]
    pub fn time_since_last_reload(&self) -> Option<Duration> {
        self.last_reload.map(|t| t.elapsed())
    }

    /// Get count of consecutive failures.
    #[allow(dead_code)]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Check if the client appears healthy.
    #[allow(dead_code)]
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures < 10
    }
}

#[async_trait]
impl Reloader for ReloadClient {
    async fn reload(&mut self) -> Result<()> {
        if self.dry_run {
            info!(
                "[DRY RUN] Would execute: {} {}",
                self.program.display(),
                self.args.join(" ")
            );
            return Ok(());
        }

        debug!(
            "Requesting page reload: {} {}",
            self.program.display(),
            self.args.join(" ")
        );

        let result = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn reload command")?
            .wait_with_output()
            .await
            .context("Failed to wait for reload command")?;

        if result.status.success() {
            trace!("Reload command succeeded");
            self.last_reload = Some(Instant::now());
            self.consecutive_failures = 0;
            Ok(())
        } else {
            self.consecutive_failures += 1;
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!(
                "Reload command failed (exit code {:?}): {}",
                result.status.code(),
                stderr.trim()
            );

            anyhow::bail!(
                "Reload command exited with code {:?}",
                result.status.code()
            )
        }
    }
}

/// Resolve the reload program to an executable path.
fn resolve_program(program: &Path) -> Result<PathBuf> {
    // Use the path as-is when it points somewhere concrete
    if program.is_absolute() {
        if program.exists() {
            return Ok(program.to_path_buf());
        }
        anyhow::bail!(
            "Configured reload command does not exist: {}",
            program.display()
        );
    }

    which::which(program).with_context(|| {
        format!(
            "Reload command '{}' not found in PATH. \
             Install it or set reload_command in config.",
            program.display()
        )
    })
}
