//! Cron-driven trigger for [`SyncJob`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SyncJob;

#[derive(Debug, Error)]
#[error("invalid sync schedule '{expression}': {reason}")]
pub struct ScheduleError {
    pub expression: String,
    pub reason: String,
}

/// Fires [`SyncJob::tick`] on a cron schedule from a background task.
pub struct SyncScheduler {
    job: Arc<SyncJob>,
    cron: Cron,
    expression: String,
    run_on_startup: bool,
}

impl SyncScheduler {
    /// Parse `expression` (seconds field optional).
    pub fn new(job: Arc<SyncJob>, expression: &str, run_on_startup: bool) -> Result<Self, ScheduleError> {
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| ScheduleError {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            job,
            cron,
            expression: expression.to_string(),
            run_on_startup,
        })
    }

    /// First scheduled time strictly after `after`.
    pub fn next_fire(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(after, false).ok()
    }

    /// Start the scheduler in a background task.
    ///
    /// Returns a shutdown sender; send `true` (or drop it) to stop the loop.
    /// An in-flight cycle is not interrupted by shutdown.
    pub fn start(self) -> (watch::Sender<bool>, JoinHandle<()>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(schedule = %self.expression, "Cars sync scheduler started");

            if self.run_on_startup {
                self.fire();
            }

            loop {
                let now = Utc::now();
                let Some(next) = self.next_fire(&now) else {
                    warn!(schedule = %self.expression, "Sync schedule has no future occurrence");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(next = %next.to_rfc3339(), "Next cars sync scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => self.fire(),
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Cars sync scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        (shutdown_tx, handle)
    }

    /// Run a tick on its own task so the timer keeps its cadence.
    fn fire(&self) {
        if self.job.is_running() {
            info!("Previous cars sync still running, skipping this fire");
            return;
        }
        let job = self.job.clone();
        tokio::spawn(async move {
            let outcome = job.tick().await;
            debug!(?outcome, "Cars sync tick finished");
        });
    }
}
