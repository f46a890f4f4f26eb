use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::apply::collaborators::Collaborators;
use crate::autonomous::orchestrator::{
    apply_outcome, fail, record_proof, until_cancelled, JobResult,
};
use crate::models::job::{JobStatus, RunOutcomeKind};
use crate::models::profile::Profile;
use crate::models::tracker::{SourceMode, Status};
use crate::tracker::{TrackerError, TrackerService};

#[derive(Debug, Clone, Default)]
pub struct SingleJobOptions {
    pub dry_run: bool,
    /// Apply again even though the posting was already submitted.
    pub override_reason: Option<String>,
}

/// Runs one posting through the pipeline outside of a batch.
pub struct SingleJobRunner {
    tracker: TrackerService,
    collaborators: Collaborators,
    profile: Arc<Profile>,
}

impl SingleJobRunner {
    pub fn new(tracker: TrackerService, collaborators: Collaborators, profile: Arc<Profile>) -> Self {
        Self {
            tracker,
            collaborators,
            profile,
        }
    }

    pub async fn apply(&self, url: &str, options: &SingleJobOptions) -> Result<JobResult, TrackerError> {
        self.apply_with_cancellation(url, options, &CancellationToken::new())
            .await
    }

    /// Tracker failures are returned; collaborator failures end up in the
    /// result.
    pub async fn apply_with_cancellation(
        &self,
        url: &str,
        options: &SingleJobOptions,
        cancel: &CancellationToken,
    ) -> Result<JobResult, TrackerError> {
        let clock = Instant::now();
        let mut result = JobResult {
            index: 1,
            url: url.to_string(),
            fingerprint: self.tracker.resolve_fingerprint(Some(url), "", "", None),
            status: JobStatus::Failed,
            outcome: None,
            error: None,
            artifacts: None,
            duration_seconds: 0.0,
        };

        let extracted = until_cancelled(cancel, self.collaborators.extractor.extract(url, cancel)).await;
        let content = match extracted {
            Ok(Some(content)) => content,
            Ok(None) => {
                result.error = Some("no job content extracted".to_string());
                return Ok(finish(result, clock));
            }
            Err(e) => {
                fail(&mut result, e);
                return Ok(finish(result, clock));
            }
        };

        let existing = self
            .tracker
            .check_duplicate(
                Some(url),
                &content.company,
                &content.role_title,
                content.location.as_deref(),
            )
            .await?;

        let fingerprint = match existing {
            Some(record) if record.status == Status::Submitted => {
                let Some(reason) = options.override_reason.as_deref() else {
                    info!(
                        "Already applied to {} - {}, skipping",
                        record.company, record.role_title
                    );
                    result.fingerprint = record.fingerprint;
                    result.status = JobStatus::Skipped;
                    result.outcome = Some(RunOutcomeKind::DuplicateSkipped);
                    return Ok(finish(result, clock));
                };
                warn!("Re-applying to {} ({reason})", record.fingerprint);
                self.tracker
                    .record_override(&record.fingerprint, Some(reason))
                    .await?;
                record.fingerprint
            }
            Some(record) => record.fingerprint,
            None => {
                self.tracker
                    .create_record(
                        Some(url),
                        &content.company,
                        &content.role_title,
                        content.location.as_deref(),
                        SourceMode::Single,
                    )
                    .await?
            }
        };
        result.fingerprint = fingerprint.clone();

        let tailored = until_cancelled(
            cancel,
            self.collaborators.tailor.tailor(&self.profile, &content, cancel),
        )
        .await;
        match tailored {
            Ok(artifacts) => {
                self.tracker
                    .update_artifacts(
                        &fingerprint,
                        artifacts.resume_path.as_deref(),
                        artifacts.cover_letter_path.as_deref(),
                    )
                    .await?;
                result.artifacts = Some(artifacts);
            }
            Err(e) => {
                fail(&mut result, e);
                self.tracker.update_status(&fingerprint, Status::Failed).await?;
                return Ok(finish(result, clock));
            }
        }

        if options.dry_run {
            result.status = JobStatus::Completed;
            return Ok(finish(result, clock));
        }

        self.tracker.update_status(&fingerprint, Status::InProgress).await?;
        let ran = until_cancelled(cancel, self.collaborators.executor.run(url, cancel)).await;
        let status = match ran {
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
        self.tracker.update_status(&fingerprint, status).await?;

        Ok(finish(result, clock))
    }
}

fn finish(mut result: JobResult, clock: Instant) -> JobResult {
    result.duration_seconds = clock.elapsed().as_secs_f64();
    result
}
