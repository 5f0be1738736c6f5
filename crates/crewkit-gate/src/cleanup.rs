//! Probabilistic notification cleanup
//!
//! Old notifications are archived and, once read and past a grace period,
//! hard-deleted. There is no dedicated scheduler: the sweep is triggered from
//! the request path with a small per-invocation probability, which amortizes
//! the maintenance cost across traffic while keeping the trigger itself
//! non-blocking.
//!
//! The running guard is a per-process `AtomicBool`: enough to stop a process
//! from overlapping its own sweeps, not a cross-instance lock. Multiple
//! instances may occasionally sweep concurrently; both phases are idempotent,
//! so the overlap wastes work but corrupts nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::stores::NotificationStore;

/// Row counts from one completed sweep
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStats {
    pub archived: u64,
    pub deleted: u64,
}

/// Two-phase notification sweep with a probabilistic, non-overlapping trigger
pub struct NotificationCleanupService {
    notifications: Arc<dyn NotificationStore>,
    probability: f64,
    batch_size: usize,
    archive_after: chrono::Duration,
    delete_read_after: chrono::Duration,
    running: AtomicBool,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl NotificationCleanupService {
    pub fn new(notifications: Arc<dyn NotificationStore>, config: &GateConfig) -> Self {
        Self {
            notifications,
            probability: config.cleanup_probability,
            batch_size: config.cleanup_batch_size,
            archive_after: config.archive_after(),
            delete_read_after: config.delete_read_after(),
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    /// Roll the dice and start a background sweep on success
    ///
    /// Returns immediately either way; the return value says whether a sweep
    /// was started. Never rolls true while a sweep is already in flight.
    pub fn maybe_trigger(self: &Arc<Self>) -> bool {
        if !self.should_run() {
            return false;
        }
        // The dice roll and the guard are separate steps; the CAS settles
        // races between concurrent winners
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let service = Arc::clone(self);
        tokio::spawn(async move {
            match service.sweep().await {
                Ok(stats) => {
                    info!(
                        archived = stats.archived,
                        deleted = stats.deleted,
                        "notification cleanup finished"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "notification cleanup failed");
                }
            }
            service.finish_run();
        });

        true
    }

    /// Run a sweep synchronously (admin endpoints, tests)
    ///
    /// Unlike the probabilistic trigger this does not queue behind an active
    /// sweep: it fails fast with [`GateError::CleanupAlreadyRunning`].
    pub async fn force_cleanup(&self) -> Result<CleanupStats, GateError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GateError::CleanupAlreadyRunning);
        }

        let result = self.sweep().await;
        self.finish_run();
        result
    }

    /// Whether a sweep is currently in flight in this process
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Completion time of the last sweep in this process
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.lock()
    }

    fn should_run(&self) -> bool {
        if self.running.load(Ordering::SeqCst) {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.probability
    }

    fn finish_run(&self) {
        *self.last_run.lock() = Some(Utc::now());
        self.running.store(false, Ordering::SeqCst);
    }

    /// Archive phase, then batched delete phase
    ///
    /// Both phases are idempotent and safe to interrupt: a killed sweep
    /// leaves rows a later sweep naturally picks up again.
    async fn sweep(&self) -> Result<CleanupStats, GateError> {
        let now = Utc::now();

        let archived = self
            .notifications
            .archive_older_than(now - self.archive_after)
            .await?;
        debug!(archived, "cleanup archive phase done");

        // Bounded batches keep individual store transactions short; a short
        // batch means the backlog is drained
        let delete_cutoff = now - self.delete_read_after;
        let mut deleted = 0u64;
        loop {
            let batch = self
                .notifications
                .delete_read_older_than(delete_cutoff, self.batch_size)
                .await?;
            deleted += batch;
            if (batch as usize) < self.batch_size {
                break;
            }
        }
        debug!(deleted, "cleanup delete phase done");

        Ok(CleanupStats { archived, deleted })
    }
}
