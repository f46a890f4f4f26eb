//! Batch Orchestrator: executes a queue one job at a time.
//!
//! Per job: PENDING → PROCESSING → COMPLETED | FAILED | SKIPPED.
//! Each external call is raced against the run's cancellation token; a
//! cancellation marks the in-flight job FAILED ("interrupted") and stops the
//! loop. A single job's failure never aborts the batch.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::apply::collaborators::{CollaboratorError, Collaborators};
use crate::autonomous::progress::{LogProgress, ProgressEvent, ProgressPhase, ProgressSink, RunningTotals};
use crate::autonomous::queue::QueuedJob;
use crate::autonomous::signals::SignalGuard;
use crate::models::job::{JobStatus, RunOutcome, RunOutcomeKind, TailoredArtifacts};
use crate::models::profile::Profile;
use crate::models::tracker::{SourceMode, Status};
use crate::tracker::{TrackerError, TrackerService};

/// Error text prefix for a job cut short by cancellation.
pub const INTERRUPTED: &str = "interrupted";

/// Outcome of one attempted job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    /// 1-based position in the queue.
    pub index: usize,
    pub url: String,
    pub fingerprint: String,
    pub status: JobStatus,
    pub outcome: Option<RunOutcomeKind>,
    pub error: Option<String>,
    pub artifacts: Option<TailoredArtifacts>,
    pub duration_seconds: f64,
}

impl JobResult {
    pub fn is_interrupted(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|e| e.starts_with(INTERRUPTED))
    }
}

/// Summary of a whole batch. Returned even when the run is interrupted.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Jobs in the queue.
    pub total: usize,
    /// Jobs actually attempted.
    pub processed: usize,
    pub submitted: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
    pub declined: bool,
    pub jobs: Vec<JobResult>,
}

enum Attempt {
    Ready(String),
    AlreadySubmitted(String),
}

/// Failure modes of one external call made on behalf of a job.
pub(crate) enum CallError {
    Interrupted,
    Collaborator(CollaboratorError),
}

/// Awaits `call` unless `cancel` fires first.
pub(crate) async fn until_cancelled<T, F>(
    cancel: &CancellationToken,
    call: F,
) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CallError::Interrupted),
        result = call => result.map_err(CallError::Collaborator),
    }
}

pub struct BatchOrchestrator {
    tracker: TrackerService,
    collaborators: Collaborators,
    profile: Arc<Profile>,
    progress: Arc<dyn ProgressSink>,
}

impl BatchOrchestrator {
    pub fn new(tracker: TrackerService, collaborators: Collaborators, profile: Arc<Profile>) -> Self {
        Self {
            tracker,
            collaborators,
            profile,
            progress: Arc::new(LogProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the queue with SIGINT/SIGTERM wired to cancellation for the
    /// duration of the call.
    pub async fn run(&self, queue: &mut [QueuedJob], dry_run: bool) -> BatchResult {
        let token = CancellationToken::new();
        let _guard = match SignalGuard::install(token.clone()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Could not install signal handlers, batch will not be interruptible: {e}");
                None
            }
        };
        self.run_with_cancellation(queue, dry_run, &token).await
    }

    /// Runs the queue against an externally owned token.
    pub async fn run_with_cancellation(
        &self,
        queue: &mut [QueuedJob],
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = queue.len();

        let mut result = BatchResult {
            run_id,
            dry_run,
            started_at,
            finished_at: started_at,
            duration_seconds: 0.0,
            total,
            processed: 0,
            submitted: 0,
            completed: 0,
            skipped: 0,
            failed: 0,
            interrupted: false,
            declined: false,
            jobs: Vec::with_capacity(total),
        };

        if total > 0 {
            let summary = confirmation_summary(queue, dry_run);
            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                answer = self.collaborators.confirmer.confirm(&summary, cancel) => Some(answer),
            };
            match answer {
                Some(true) => {}
                Some(false) => {
                    info!("Batch {run_id} declined at confirmation");
                    result.declined = true;
                    return finish(result, clock);
                }
                None => {
                    warn!("Batch {run_id} interrupted at confirmation");
                    result.interrupted = true;
                    return finish(result, clock);
                }
            }
        }

        info!(
            "Batch {run_id} starting: {total} jobs ({})",
            if dry_run { "dry run" } else { "live" }
        );

        let mut totals = RunningTotals::default();
        for (position, job) in queue.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                result.interrupted = true;
                break;
            }

            let index = position + 1;
            job.status = JobStatus::Processing;
            self.emit(ProgressPhase::Started, index, total, job, totals);

            let job_clock = Instant::now();
            let mut job_result = if dry_run {
                self.run_dry(job, cancel).await
            } else {
                self.run_live(job, cancel).await
            };
            job_result.index = index;
            job_result.duration_seconds = job_clock.elapsed().as_secs_f64();

            job.status = job_result.status;
            totals.processed += 1;
            match job_result.status {
                JobStatus::Completed => {
                    totals.completed += 1;
                    if !dry_run {
                        totals.submitted += 1;
                    }
                }
                JobStatus::Skipped => totals.skipped += 1,
                _ => totals.failed += 1,
            }
            self.emit(ProgressPhase::Finished, index, total, job, totals);

            let interrupted = job_result.is_interrupted();
            result.jobs.push(job_result);
            if interrupted {
                warn!("Batch {run_id} interrupted during job {index} of {total}");
                result.interrupted = true;
                break;
            }
        }

        result.processed = totals.processed;
        result.submitted = totals.submitted;
        result.completed = totals.completed;
        result.skipped = totals.skipped;
        result.failed = totals.failed;

        let result = finish(result, clock);
        info!(
            "Batch {run_id} finished in {:.1}s: {} processed, {} submitted, {} completed, {} skipped, {} failed",
            result.duration_seconds,
            result.processed,
            result.submitted,
            result.completed,
            result.skipped,
            result.failed
        );
        result
    }

    async fn run_dry(&self, job: &QueuedJob, cancel: &CancellationToken) -> JobResult {
        let mut result = blank_result(job);
        let call = self
            .collaborators
            .tailor
            .tailor(&self.profile, &job.content, cancel);

        match until_cancelled(cancel, call).await {
            Ok(artifacts) => {
                result.status = JobStatus::Completed;
                result.artifacts = Some(artifacts);
            }
            Err(e) => fail(&mut result, e),
        }
        result
    }

    async fn run_live(&self, job: &QueuedJob, cancel: &CancellationToken) -> JobResult {
        let mut result = blank_result(job);

        let fingerprint = match self.begin_attempt(job).await {
            Ok(Attempt::Ready(fingerprint)) => fingerprint,
            Ok(Attempt::AlreadySubmitted(fingerprint)) => {
                info!("Already applied to {} ({fingerprint}), skipping", job.url);
                result.fingerprint = fingerprint;
                result.status = JobStatus::Skipped;
                result.outcome = Some(RunOutcomeKind::DuplicateSkipped);
                return result;
            }
            Err(e) => {
                error!("Could not track {} before applying: {e}", job.url);
                result.status = JobStatus::Failed;
                result.error = Some(format!("tracker error: {e}"));
                return result;
            }
        };
        result.fingerprint = fingerprint.clone();

        let call = self.collaborators.executor.run(&job.url, cancel);
        let tracker_status = match until_cancelled(cancel, call).await {
            Ok(outcome) => {
                apply_outcome(&mut result, &outcome);
                record_proof(&self.tracker, &fingerprint, &outcome).await;
                outcome.kind.tracker_status()
            }
            Err(e) => {
                fail(&mut result, e);
                Status::Failed
            }
        };

        if let Err(e) = self.tracker.update_status(&fingerprint, tracker_status).await {
            error!("Could not record {tracker_status} for {}: {e}", job.url);
            if result.error.is_none() {
                result.error = Some(format!("tracker error: {e}"));
            }
        }
        result
    }

    /// Ensures a tracker record exists and marks it in progress, unless the
    /// posting was already submitted.
    async fn begin_attempt(&self, job: &QueuedJob) -> Result<Attempt, TrackerError> {
        let record = match self.tracker.get_record(&job.fingerprint).await? {
            Some(record) => record,
            None => {
                let created = self
                    .tracker
                    .create_record(
                        Some(&job.url),
                        &job.content.company,
                        &job.content.role_title,
                        job.content.location.as_deref(),
                        SourceMode::Autonomous,
                    )
                    .await;
                match created {
                    Ok(fingerprint) => {
                        self.tracker.update_status(&fingerprint, Status::InProgress).await?;
                        return Ok(Attempt::Ready(fingerprint));
                    }
                    Err(TrackerError::DuplicateKey { fingerprint }) => {
                        warn!("Record {fingerprint} already exists, reusing it");
                        let existing = self.tracker.get_record(&fingerprint).await?;
                        existing.ok_or(TrackerError::NotFound { fingerprint })?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if record.status == Status::Submitted {
            return Ok(Attempt::AlreadySubmitted(record.fingerprint));
        }
        self.tracker
            .update_status(&record.fingerprint, Status::InProgress)
            .await?;
        Ok(Attempt::Ready(record.fingerprint))
    }

    fn emit(
        &self,
        phase: ProgressPhase,
        index: usize,
        total: usize,
        job: &QueuedJob,
        totals: RunningTotals,
    ) {
        self.progress.report(&ProgressEvent {
            phase,
            index,
            total,
            url: job.url.clone(),
            status: job.status,
            totals,
        });
    }
}

pub(crate) fn blank_result(job: &QueuedJob) -> JobResult {
    JobResult {
        index: 0,
        url: job.url.clone(),
        fingerprint: job.fingerprint.clone(),
        status: JobStatus::Failed,
        outcome: None,
        error: None,
        artifacts: None,
        duration_seconds: 0.0,
    }
}

pub(crate) fn apply_outcome(result: &mut JobResult, outcome: &RunOutcome) {
    result.status = outcome.kind.job_status();
    result.outcome = Some(outcome.kind);
    if result.status == JobStatus::Failed {
        result.error = Some(outcome.failure_message());
    }
}

pub(crate) fn fail(result: &mut JobResult, error: CallError) {
    result.status = JobStatus::Failed;
    result.error = Some(match error {
        CallError::Interrupted => {
            format!("{INTERRUPTED}: cancellation requested while the job was in flight")
        }
        CallError::Collaborator(e) => {
            warn!("Job {} failed: {e}", result.url);
            e.to_string()
        }
    });
}

/// Stores whatever proof the executor returned. Failures are logged only.
pub(crate) async fn record_proof(tracker: &TrackerService, fingerprint: &str, outcome: &RunOutcome) {
    if outcome.proof_text.is_none() && outcome.proof_screenshot_path.is_none() {
        return;
    }
    if let Err(e) = tracker
        .update_proof(
            fingerprint,
            outcome.proof_text.as_deref(),
            outcome.proof_screenshot_path.as_deref(),
        )
        .await
    {
        error!("Could not store proof for {fingerprint}: {e}");
    }
}

fn finish(mut result: BatchResult, clock: Instant) -> BatchResult {
    result.finished_at = Utc::now();
    result.duration_seconds = clock.elapsed().as_secs_f64();
    result
}

/// Human-readable summary shown to the confirmer before a batch starts.
pub fn confirmation_summary(queue: &[QueuedJob], dry_run: bool) -> String {
    let mode = if dry_run {
        "generate documents for"
    } else {
        "submit applications to"
    };
    let mut summary = format!("About to {mode} {} job(s):\n", queue.len());
    for (i, job) in queue.iter().take(10).enumerate() {
        summary.push_str(&format!(
            "  {}. [{:.2}] {} - {} ({})\n",
            i + 1,
            job.fit.total_score,
            job.content.company,
            job.content.role_title,
            job.url
        ));
    }
    if queue.len() > 10 {
        summary.push_str(&format!("  ... and {} more\n", queue.len() - 10));
    }
    summary
}
