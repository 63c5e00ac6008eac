//! idle-reloadd - Idle watchdog daemon for kiosk dashboards.
//!
//! Watches user-interaction signals reported by the kiosk session and reloads
//! the displayed page after five minutes without activity.

use idle_reloadd::activity::{ActivitySource, SocketSource};
use idle_reloadd::config::Config;
use idle_reloadd::daemon::{self, RunOptions};
use idle_reloadd::reload::ReloadClient;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Idle reload daemon for kiosk dashboards.
///
/// Observes activity signals from the kiosk session and requests a full page
/// reload after five minutes without any.
#[derive(Parser, Debug)]
#[command(name = "idle-reloadd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable dry-run mode (don't actually execute the reload command).
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print normalized activity signals to stdout.
    #[arg(long)]
    print_events: bool,

    /// Run in oneshot mode: connect, print a few signals, then exit.
    #[arg(long)]
    oneshot: bool,

    /// Number of signals to capture in oneshot mode.
    #[arg(long, default_value = "5")]
    oneshot_count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("idle-reloadd v{} starting", env!("CARGO_PKG_VERSION"));

    // Load config
    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    if args.dry_run {
        config.dry_run = true;
    }

    info!("Configuration loaded (dry_run={})", config.dry_run);

    // Check environment
    if config.socket_path.is_none() && env::var("XDG_RUNTIME_DIR").is_err() {
        error!("Kiosk session environment not detected.");
        for diag in SocketSource::get_diagnostics() {
            error!("  {}", diag);
        }
        error!("");
        error!("Set XDG_RUNTIME_DIR or configure socket_path.");
        anyhow::bail!("Activity socket environment not available");
    }

    // Show diagnostics
    for diag in SocketSource::get_diagnostics() {
        debug!("{}", diag);
    }

    // Oneshot mode
    if args.oneshot {
        return run_oneshot(&config, args.oneshot_count, args.print_events).await;
    }

    // Normal daemon mode
    run_daemon(config, args.print_events).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("idle_reloadd={}", level))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Run in oneshot mode: capture a few signals and exit.
async fn run_oneshot(config: &Config, count: usize, print_events: bool) -> Result<()> {
    info!("Running in oneshot mode, capturing {} signals", count);

    let mut source = SocketSource::connect(config.socket_path.clone()).await?;

    // Capture signals
    let mut captured = 0;
    while captured < count {
        match tokio::time::timeout(Duration::from_secs(30), source.next_event()).await {
            Ok(Ok(event)) => {
                captured += 1;
                if print_events {
                    println!("[{}] | kind={}", captured, event.kind.as_str());
                } else {
                    info!("Signal {}/{}: {}", captured, count, event.kind.as_str());
                }
            }
            Ok(Err(e)) => {
                error!("Activity signal error: {}", e);
                break;
            }
            Err(_) => {
                warn!("Timeout waiting for activity signals");
                break;
            }
        }
    }

    info!("Oneshot mode complete, captured {} signals", captured);
    Ok(())
}

/// Run daemon mode until a fatal error or Ctrl-C.
async fn run_daemon(config: Config, print_events: bool) -> Result<()> {
    let reloader =
        ReloadClient::from_config(&config).context("Failed to initialize reload client")?;

    let source = SocketSource::connect(config.socket_path.clone()).await?;

    let options = RunOptions {
        print_events,
        arm_on_start: config.arm_on_start,
    };

    info!("Daemon started, waiting for activity signals...");

    tokio::select! {
        result = daemon::run(source, reloader, options) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}
