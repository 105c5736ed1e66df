//! Background Cleanup
//!
//! Each component owns one long-lived task that wakes on a fixed interval and
//! sweeps its map under the same lock foreground calls take, so a sweep and a
//! check are never interleaved.
//!
//! Stopping aborts the task and waits for it to finish. The task only yields
//! while sleeping or waiting for a lock, so an abort never lands mid-sweep.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::SweepOutcome;

/// Something with a map worth sweeping
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    /// Run one sweep and report what it removed
    async fn sweep(&self) -> SweepOutcome;
}

/// Lifecycle handle for one component's periodic sweep
#[derive(Debug)]
pub struct CleanupTask {
    /// Component name used in log fields
    component: &'static str,

    /// Running task, if started
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupTask {
    /// Create a stopped cleanup task
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            handle: Mutex::new(None),
        }
    }

    /// Start sweeping `target` every `period`
    ///
    /// Returns `false` if a task is already running or the period is zero.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, period: Duration, target: Arc<dyn Sweep>) -> bool {
        let component = self.component;

        if period.is_zero() {
            tracing::warn!(component, "Refusing to start cleanup task with a zero interval");
            return false;
        }

        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // First tick completes immediately; the first sweep is one period in.
            interval.tick().await;

            loop {
                interval.tick().await;

                match AssertUnwindSafe(target.sweep()).catch_unwind().await {
                    Ok(outcome) if outcome.dropped() > 0 => {
                        tracing::debug!(
                            component,
                            examined = outcome.examined,
                            removed = outcome.removed,
                            malformed = outcome.malformed,
                            "Cleanup sweep finished"
                        );
                    }
                    Ok(_) => {}
                    Err(_) => {
                        tracing::error!(component, "Cleanup sweep panicked; retrying next interval");
                    }
                }
            }
        });

        *slot = Some(handle);
        tracing::info!(component, period_secs = period.as_secs(), "Cleanup task started");
        true
    }

    /// Cancel the task and wait for it to terminate
    pub async fn stop(&self) {
        let handle = {
            let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
            slot.take()
        };

        let Some(handle) = handle else {
            return;
        };

        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                tracing::warn!(component = self.component, error = %e, "Cleanup task ended abnormally");
            }
        }

        tracing::info!(component = self.component, "Cleanup task stopped");
    }

    /// Whether a sweep task is currently running
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        let slot = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
