use serde::Serialize;
use tracing::info;

use crate::models::job::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Started,
    Finished,
}

/// Running totals at the moment an event is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunningTotals {
    pub processed: usize,
    pub submitted: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Emitted immediately before and after each job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    /// 1-based position in the queue.
    pub index: usize,
    pub total: usize,
    pub url: String,
    pub status: JobStatus,
    pub totals: RunningTotals,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Reports progress through `tracing`.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        match event.phase {
            ProgressPhase::Started => {
                info!("[{}/{}] Processing {}", event.index, event.total, event.url);
            }
            ProgressPhase::Finished => {
                let t = &event.totals;
                info!(
                    "[{}/{}] {} -> {} (submitted {}, completed {}, skipped {}, failed {})",
                    event.index,
                    event.total,
                    event.url,
                    event.status,
                    t.submitted,
                    t.completed,
                    t.skipped,
                    t.failed
                );
            }
        }
    }
}
