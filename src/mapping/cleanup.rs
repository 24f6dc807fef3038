//! Periodic eviction of stale mappings.

use std::sync::Weak;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::MappingManager;
use crate::types::EntityType;

/// Per-entity outcome of one cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<(EntityType, u64)>,
    pub failed: Vec<(EntityType, String)>,
    pub aborted: bool,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

/// Runs `cleanup_stale_mappings` for every entity type.
///
/// A failure for one type is logged and the remaining types still run.
/// Cancelling `cancel` aborts the pass between (or during) entity types.
pub async fn run_cleanup_pass(
    manager: &MappingManager,
    max_age: chrono::Duration,
    cancel: &CancellationToken,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    let threshold = Utc::now() - max_age;

    for entity_type in EntityType::ALL {
        if cancel.is_cancelled() {
            report.aborted = true;
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(entity_type = %entity_type, "Cleanup pass aborted by shutdown");
                report.aborted = true;
                break;
            }
            res = manager.cleanup_stale_mappings(entity_type, threshold) => match res {
                Ok(n) => report.deleted.push((entity_type, n)),
                Err(e) => {
                    tracing::error!(entity_type = %entity_type, error = %e, "Stale mapping cleanup failed");
                    report.failed.push((entity_type, e.to_string()));
                }
            }
        }
    }
    report
}

/// Background task owned by the manager, cancelled as a whole on disconnect.
pub struct CleanupScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CleanupScheduler {
    /// Spawns the timer. The first pass runs one `period` after start.
    pub fn start(weak: Weak<MappingManager>, period: Duration, max_age: chrono::Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(manager) = weak.upgrade() else { break };
                let report = run_cleanup_pass(&manager, max_age, &token).await;
                manager.metrics().inc_cleanup_runs();
                manager.metrics().add_cleanup_failures(report.failed.len() as u64);
                tracing::info!(
                    deleted = report.total_deleted(),
                    failed = report.failed.len(),
                    aborted = report.aborted,
                    "Scheduled mapping cleanup finished"
                );
            }
            tracing::debug!("Cleanup scheduler stopped");
        });
        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancels the timer and waits for an in-flight pass to wind down.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Cleanup scheduler task ended abnormally: {}", e);
        }
    }
}
