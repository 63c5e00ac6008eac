//! Daemon event loop.
//!
//! Drives the idle watchdog: every observed signal re-arms the countdown, and
//! an uninterrupted countdown triggers the reload effect.

use crate::activity::{ActivityEvent, ActivitySource};
use crate::reload::Reloader;
use crate::watchdog::{IDLE_TIMEOUT, Watchdog};
use anyhow::{Context, Result};
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

/// Options for the daemon loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Print normalized activity signals to stdout.
    pub print_events: bool,

    /// Arm the watchdog at startup instead of waiting for the first signal.
    pub arm_on_start: bool,
}

/// Run the daemon event loop.
///
/// Returns only on an unrecoverable source error; sources retry transient
/// failures internally.
pub async fn run<S, R>(mut source: S, mut reloader: R, options: RunOptions) -> Result<()>
where
    S: ActivitySource,
    R: Reloader,
{
    let mut watchdog = Watchdog::new(IDLE_TIMEOUT);

    if options.arm_on_start {
        info!("Arming watchdog at startup");
        watchdog.arm();
    }

    loop {
        // Snapshot the deadline so the expiry future does not hold a borrow
        // across the arm/fire transitions below.
        let deadline = watchdog.deadline();

        tokio::select! {
            event = source.next_event() => {
                let event = event.context("Activity source failed")?;
                handle_signal(&event, &mut watchdog, options.print_events);
            }

            () = expiry(deadline) => {
                watchdog.fire();
                info!(
                    "No activity for {:?}, requesting page reload",
                    watchdog.timeout()
                );
                if let Err(e) = reloader.reload().await {
                    warn!("Failed to request reload: {}", e);
                }
            }
        }
    }
}

/// Handle one activity signal.
///
/// All signal kinds have the same effect; the kind only decides the log line.
fn handle_signal(event: &ActivityEvent, watchdog: &mut Watchdog, print_events: bool) {
    if print_events {
        println!("[SIGNAL] kind={}", event.kind.as_str());
    }

    if event.kind.is_interaction() {
        trace!("Activity: {}, countdown reset", event.kind.as_str());
    } else {
        debug!("Page load reported, arming watchdog");
    }

    watchdog.arm();
}

/// Resolves when the deadline passes; pends forever while no countdown is live.
async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityError, SignalKind};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::advance;

    /// Test source fed from a channel; a closed channel is a source failure.
    struct ChannelSource(mpsc::Receiver<SignalKind>);

    #[async_trait]
    impl ActivitySource for ChannelSource {
        async fn next_event(&mut self) -> Result<ActivityEvent, ActivityError> {
            match self.0.recv().await {
                Some(kind) => Ok(ActivityEvent::new(kind)),
                None => Err(ActivityError::ConnectionFailed("channel closed".to_string())),
            }
        }
    }

    /// Test reloader that counts firings.
    struct CountingReloader(Arc<AtomicU32>);

    #[async_trait]
    impl Reloader for CountingReloader {
        async fn reload(&mut self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn start_daemon(
        options: RunOptions,
    ) -> (
        mpsc::Sender<SignalKind>,
        Arc<AtomicU32>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let reloads = Arc::new(AtomicU32::new(0));
        let handle = tokio::spawn(run(
            ChannelSource(rx),
            CountingReloader(reloads.clone()),
            options,
        ));
        (tx, reloads, handle)
    }

    /// Let the daemon task process whatever is queued.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_fires_after_idle_timeout() {
        let (tx, reloads, handle) = start_daemon(RunOptions::default());

        tx.send(SignalKind::PageLoad).await.unwrap();
        settle().await;

        advance(Duration::from_secs(299)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        // Fired is terminal for this instance: no second reload without a
        // fresh page-load signal
        advance(Duration::from_secs(1200)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reload_while_active() {
        let (tx, reloads, handle) = start_daemon(RunOptions::default());

        tx.send(SignalKind::PageLoad).await.unwrap();
        settle().await;

        // Mouse movement every 4 minutes for 20 minutes
        for _ in 0..5 {
            advance(Duration::from_secs(240)).await;
            settle().await;
            tx.send(SignalKind::MouseMove).await.unwrap();
            settle().await;
        }

        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_interaction_kind_resets() {
        let kinds = [
            SignalKind::MouseMove,
            SignalKind::KeyPress,
            SignalKind::TouchStart,
            SignalKind::Click,
        ];

        for kind in kinds {
            let (tx, reloads, handle) = start_daemon(RunOptions::default());

            tx.send(SignalKind::PageLoad).await.unwrap();
            settle().await;

            advance(Duration::from_secs(240)).await;
            settle().await;
            tx.send(kind).await.unwrap();
            settle().await;

            // 60s past the original deadline: the reset must have superseded it
            advance(Duration::from_secs(120)).await;
            settle().await;
            assert_eq!(reloads.load(Ordering::SeqCst), 0, "kind {:?}", kind);

            // 300s after the reset, the countdown fires
            advance(Duration::from_secs(180)).await;
            settle().await;
            assert_eq!(reloads.load(Ordering::SeqCst), 1, "kind {:?}", kind);

            handle.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_signals_single_countdown() {
        let (tx, reloads, handle) = start_daemon(RunOptions::default());

        tx.send(SignalKind::PageLoad).await.unwrap();
        tx.send(SignalKind::Click).await.unwrap();
        tx.send(SignalKind::Click).await.unwrap();
        settle().await;

        advance(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_click_defers_reload() {
        let (tx, reloads, handle) = start_daemon(RunOptions::default());

        tx.send(SignalKind::PageLoad).await.unwrap();
        settle().await;

        advance(Duration::from_secs(299)).await;
        settle().await;
        tx.send(SignalKind::Click).await.unwrap();
        settle().await;

        // Not at t=300s...
        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(298)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        // ...but at t=599s (299s + 300s)
        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_reload_on_page_load() {
        let (tx, reloads, handle) = start_daemon(RunOptions::default());

        tx.send(SignalKind::PageLoad).await.unwrap();
        settle().await;

        advance(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        // The reloaded page reports back in, starting a fresh instance
        tx.send(SignalKind::PageLoad).await.unwrap();
        settle().await;

        advance(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_on_start_without_signals() {
        let options = RunOptions {
            arm_on_start: true,
            ..Default::default()
        };
        let (_tx, reloads, handle) = start_daemon(options);
        settle().await;

        advance(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_until_first_signal() {
        let (_tx, reloads, handle) = start_daemon(RunOptions::default());
        settle().await;

        advance(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_ends_loop() {
        let (tx, _reloads, handle) = start_daemon(RunOptions::default());

        drop(tx);

        let result = handle.await.unwrap();
        assert!(result.is_err());
    }
}
