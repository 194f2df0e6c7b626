//! Background drivers: periodic queue recalculation and the daily reset.
//!
//! Both tasks invoke the same orchestrator operations as the request
//! path — no duplicated logic. The recalculation tick keeps wait-time
//! contributions fresh even when no request arrives; the daily task
//! resets tokens and counters at the configured hour.
//!
//! Lifecycle: `start()` spawns the tasks and returns a handle;
//! `shutdown()` (or dropping the handle) stops them at the next await
//! point.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::orchestrator::QueueOrchestrator;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Attempts per recalculation cycle before giving up until the next tick.
const MAX_RECALC_ATTEMPTS: u32 = 3;

/// Fixed delay between retry attempts within one cycle.
const RETRY_DELAY: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════
// Handle
// ═══════════════════════════════════════════════════════════

/// Handle to the running background tasks. Supports graceful shutdown
/// via `shutdown()` or automatic cleanup on `Drop`.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal both tasks to stop. They exit at their next await point;
    /// an in-flight cycle completes first.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Spawn the recalculation and daily-reset tasks.
pub fn start(orchestrator: Arc<QueueOrchestrator>, settings: &Settings) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let recalc = tokio::spawn(recalc_loop(
        orchestrator.clone(),
        settings.recalc_interval,
        shutdown_rx.clone(),
    ));
    let reset = tokio::spawn(daily_reset_loop(
        orchestrator,
        settings.reset_hour,
        shutdown_rx,
    ));

    SchedulerHandle {
        shutdown_tx,
        tasks: vec![recalc, reset],
    }
}

// ═══════════════════════════════════════════════════════════
// Recalculation loop
// ═══════════════════════════════════════════════════════════

async fn recalc_loop(
    orchestrator: Arc<QueueOrchestrator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Recalculation driver started");
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Consume initial immediate tick

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_recalc_cycle(&orchestrator).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Recalculation driver stopped");
                    return;
                }
            }
        }
    }
}

/// One cycle with bounded retry. A failed cycle never takes the driver
/// down; it logs and waits for the next tick.
async fn run_recalc_cycle(orchestrator: &QueueOrchestrator) {
    for attempt in 1..=MAX_RECALC_ATTEMPTS {
        match orchestrator.recalculate_and_publish() {
            Ok(rescored) => {
                tracing::debug!(rescored, "Queue recalculated");
                return;
            }
            Err(e) if attempt < MAX_RECALC_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "Recalculation failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Recalculation gave up until next tick");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Daily reset loop
// ═══════════════════════════════════════════════════════════

async fn daily_reset_loop(
    orchestrator: Arc<QueueOrchestrator>,
    reset_hour: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(reset_hour, "Daily reset driver started");
    loop {
        let wait = until_next_reset(Utc::now(), reset_hour);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                // No retry: a failure rolls back and the next day's run
                // self-heals.
                match orchestrator.daily_reset() {
                    Ok(()) => tracing::info!("Daily reset complete"),
                    Err(e) => tracing::error!(error = %e, "Daily reset failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Daily reset driver stopped");
                    return;
                }
            }
        }
    }
}

/// Time remaining until the next occurrence of `reset_hour`:00 UTC.
fn until_next_reset(now: DateTime<Utc>, reset_hour: u32) -> Duration {
    let reset_hour = reset_hour.min(23);
    let today_reset = now
        .date_naive()
        .and_hms_opt(reset_hour, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);

    let next = if today_reset > now {
        today_reset
    } else {
        today_reset + chrono::Duration::days(1)
    };

    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}
